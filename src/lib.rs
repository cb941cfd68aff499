//! Raster mask authoring and refinement on top of [imageproc].
//!
//! A [`MaskEditor`] session shows a source image, lets the user paint or
//! erase translucent coverage over it, asks an external
//! [`SegmentationService`] for point, subject or whole-image segmentation,
//! refines coverage with feather/expand/contract, and finally exports a
//! black/white mask at the image's native resolution.
//!
//! The modules follow the stages of that pipeline; [`session`] ties them
//! together.

mod colors;
mod composite;
pub mod config;
pub mod drawing;
pub mod error;
pub mod export;
pub mod geometry;
pub mod inline;
pub mod morphology;
pub mod region;
pub mod segmentation;
pub mod session;
pub mod surface;

pub use colors::generate_contrasting_colors;
pub use config::EditorConfig;
pub use error::{Error, Result};
pub use geometry::{DisplayLayout, LogicalPoint, Viewport};
pub use inline::InlineImage;
pub use segmentation::{SegmentationKind, SegmentationRequest, SegmentationService, ServiceReply};
pub use session::{
    ActiveTool, Controls, CursorHint, MaskEditor, PendingSegmentation, PointerAction, Tool,
};
pub use surface::SurfaceStack;
