//! The editing session: one controller owning the surfaces, the active
//! tool, the busy flag and the error banner.
//!
//! Pointer events and raster mutation are synchronous. The three
//! segmentation operations are split into `begin_*` (acquire the busy
//! flag and build the request) and [`MaskEditor::complete_segmentation`]
//! (apply the reply), with async conveniences that run the service call in
//! between.

use std::time::Instant;

use image::RgbaImage;
use image::imageops::FilterType;
use palette::Srgb;
use tracing::{debug, info, instrument, warn};

use crate::config::EditorConfig;
use crate::drawing::{Brush, BrushMode, StrokeState};
use crate::error::{Error, Result};
use crate::export;
use crate::geometry::{DisplayLayout, LogicalPoint, Viewport};
use crate::inline::InlineImage;
use crate::morphology;
use crate::region::RegionPicker;
use crate::segmentation::{
    self, BusyFlag, BusyGuard, SegmentationKind, SegmentationRequest, SegmentationService,
    ServiceReply,
};
use crate::surface::SurfaceStack;

/// Tools the user can select directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Brush,
    Eraser,
    PointSelect,
}

/// The single interpretation of pointer events currently in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTool {
    Brush,
    Eraser,
    PointSelect,
    /// A segmentation map is displayed and clicks pick regions from it
    RegionPick,
}

#[derive(Debug, Clone)]
enum InputMode {
    Tool(Tool),
    RegionPick { resume: Tool, picker: RegionPicker },
}

impl InputMode {
    fn base_tool(&self) -> Tool {
        match self {
            InputMode::Tool(tool) => *tool,
            InputMode::RegionPick { resume, .. } => *resume,
        }
    }
}

/// What a pointer event did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    /// Nothing happened
    None,
    /// A brush or eraser sample was applied
    Painted,
    /// The user asked for the object at this point; start
    /// [`MaskEditor::begin_point_segmentation`] (or
    /// [`MaskEditor::segment_point`]) with it.
    PointSegmentationRequested(LogicalPoint),
    /// The hovered region was added to the mask and the map dismissed
    RegionPicked,
    /// The map was dismissed without picking
    MapDismissed,
}

/// Pointer affordance for the current tool and hover state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHint {
    /// Round brush outline of the given logical diameter
    Brush { diameter: u32, erasing: bool },
    Crosshair,
    /// Over a selectable region
    Pointer,
}

/// Which triggers are currently available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub auto_segment: bool,
    pub segment_subject: bool,
    pub point_select: bool,
    pub brush: bool,
    pub erase: bool,
    pub brush_size: bool,
    pub refine: bool,
    pub clear: bool,
    pub save: bool,
}

/// A segmentation request that holds the session's busy flag.
///
/// Pass it back to [`MaskEditor::complete_segmentation`] with the service's
/// answer. Dropping it instead releases the flag without touching the mask.
#[derive(Debug)]
pub struct PendingSegmentation {
    request: SegmentationRequest,
    _guard: BusyGuard,
}

impl PendingSegmentation {
    pub fn request(&self) -> &SegmentationRequest {
        &self.request
    }

    pub fn kind(&self) -> SegmentationKind {
        self.request.kind
    }
}

/// One mask editing session over one source image.
#[derive(Debug)]
pub struct MaskEditor {
    config: EditorConfig,
    source_inline: InlineImage,
    source: image::DynamicImage,
    surfaces: SurfaceStack,
    mode: InputMode,
    stroke: StrokeState,
    brush_size: u32,
    mask_present: bool,
    busy: BusyFlag,
    loading: Option<&'static str>,
    error: Option<String>,
    pulse_started: Option<Instant>,
}

impl MaskEditor {
    /// Starts a session for `image`, optionally seeded with a previously
    /// saved mask.
    ///
    /// # Errors
    ///
    /// A source image that cannot be decoded is a fatal [`Error::Load`]; the
    /// caller should cancel. An undecodable initial mask is not fatal: the
    /// session starts empty and reports it through [`MaskEditor::error`].
    pub fn open(
        image: InlineImage,
        initial_mask: Option<&InlineImage>,
        viewport: Viewport,
        config: EditorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let source = image.decode().inspect_err(|e| {
            warn!(error = %e, mime_type = %image.mime_type, "source image failed to load");
        })?;

        let mut error = None;
        let initial = match initial_mask.map(InlineImage::decode).transpose() {
            Ok(mask) => mask,
            Err(e) => {
                warn!(error = %e, "ignoring undecodable initial mask");
                error = Some("Failed to load the saved mask.".to_string());
                None
            }
        };

        let surfaces =
            SurfaceStack::new(&source, initial.as_ref(), viewport, config.coverage_alpha_u8())?;
        let mask_present = surfaces.has_coverage();
        info!(
            width = source.width(),
            height = source.height(),
            mask_present,
            "mask editor opened"
        );

        Ok(Self {
            brush_size: config.clamp_brush_size(config.brush_size),
            config,
            source_inline: image,
            source,
            surfaces,
            mode: InputMode::Tool(Tool::Brush),
            stroke: StrokeState::default(),
            mask_present,
            busy: BusyFlag::default(),
            loading: None,
            error,
            pulse_started: None,
        })
    }

    /// Reallocates the surfaces for a new container size or pixel ratio.
    ///
    /// Mask coverage is kept; a displayed segmentation map is re-rendered.
    pub fn resize(&mut self, viewport: Viewport) -> Result<()> {
        self.stroke.end();
        self.surfaces.resize(&self.source, viewport)?;
        debug!(?viewport, "surfaces resized");
        if let InputMode::RegionPick { picker, .. } = &mut self.mode {
            picker.clear_hover();
            self.surfaces.show_detection(picker.map());
        }
        Ok(())
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn surfaces(&self) -> &SurfaceStack {
        &self.surfaces
    }

    pub fn layout(&self) -> &DisplayLayout {
        self.surfaces.layout()
    }

    /// Whether the mask has any coverage; gates refinement and saving.
    pub fn mask_present(&self) -> bool {
        self.mask_present
    }

    pub fn is_loading(&self) -> bool {
        self.busy.is_set()
    }

    /// Label of the in-flight segmentation request, if any.
    pub fn loading_message(&self) -> Option<&'static str> {
        self.loading.filter(|_| self.busy.is_set())
    }

    /// The most recent failure, replaced by the next one.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn active_tool(&self) -> ActiveTool {
        match &self.mode {
            InputMode::Tool(Tool::Brush) => ActiveTool::Brush,
            InputMode::Tool(Tool::Eraser) => ActiveTool::Eraser,
            InputMode::Tool(Tool::PointSelect) => ActiveTool::PointSelect,
            InputMode::RegionPick { .. } => ActiveTool::RegionPick,
        }
    }

    /// Map color under the pointer while region picking.
    pub fn hovered_color(&self) -> Option<Srgb<u8>> {
        match &self.mode {
            InputMode::RegionPick { picker, .. } => picker.hovered(),
            InputMode::Tool(_) => None,
        }
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    /// Sets the brush diameter, clamped into the configured range.
    pub fn set_brush_size(&mut self, size: u32) -> u32 {
        self.brush_size = self.config.clamp_brush_size(size);
        self.brush_size
    }

    /// Whether the refinement pulse is still showing.
    pub fn is_animating(&self) -> bool {
        self.pulse_started
            .is_some_and(|started| started.elapsed() < self.config.pulse_duration)
    }

    pub fn cursor(&self) -> CursorHint {
        match &self.mode {
            InputMode::RegionPick { picker, .. } if picker.hovered().is_some() => {
                CursorHint::Pointer
            }
            InputMode::RegionPick { .. } | InputMode::Tool(Tool::PointSelect) => {
                CursorHint::Crosshair
            }
            InputMode::Tool(tool) => CursorHint::Brush {
                diameter: self.brush_size,
                erasing: *tool == Tool::Eraser,
            },
        }
    }

    pub fn controls(&self) -> Controls {
        let idle = !self.busy.is_set();
        let painting = matches!(self.mode, InputMode::Tool(Tool::Brush | Tool::Eraser));
        let has_mask = self.mask_present && idle;
        Controls {
            auto_segment: idle,
            segment_subject: idle,
            point_select: idle,
            brush: idle,
            erase: idle,
            brush_size: idle && painting,
            refine: has_mask,
            clear: has_mask,
            save: has_mask,
        }
    }

    /// Switches tools, ending any stroke and dismissing a displayed map.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] while a segmentation request is in flight.
    pub fn select_tool(&mut self, tool: Tool) -> Result<()> {
        if self.busy.is_set() {
            return Err(Error::Busy);
        }
        self.stroke.end();
        self.dismiss_map();
        self.mode = InputMode::Tool(tool);
        debug!(?tool, "tool selected");
        Ok(())
    }

    pub fn pointer_down(&mut self, at: LogicalPoint) -> PointerAction {
        match self.active_tool() {
            ActiveTool::RegionPick => self.pick_region(),
            ActiveTool::PointSelect if self.busy.is_set() => PointerAction::None,
            ActiveTool::PointSelect => PointerAction::PointSegmentationRequested(at),
            ActiveTool::Brush | ActiveTool::Eraser => {
                self.stroke.begin();
                self.paint(at)
            }
        }
    }

    pub fn pointer_move(&mut self, at: LogicalPoint) -> PointerAction {
        let position = self.surfaces.layout().to_physical(at);
        if let InputMode::RegionPick { picker, .. } = &mut self.mode {
            if picker.hover(self.surfaces.detection(), position, self.config.hover_threshold) {
                self.refresh_highlight();
            }
            return PointerAction::None;
        }
        match self.mode.base_tool() {
            Tool::PointSelect => PointerAction::None,
            Tool::Brush | Tool::Eraser => self.paint(at),
        }
    }

    pub fn pointer_up(&mut self) {
        if self.stroke.end() {
            self.refresh_presence();
        }
    }

    /// The pointer left the surfaces: ends the stroke and clears the hover.
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
        let cleared = match &mut self.mode {
            InputMode::RegionPick { picker, .. } => picker.clear_hover(),
            InputMode::Tool(_) => false,
        };
        if cleared {
            self.refresh_highlight();
        }
    }

    /// Removes all coverage.
    pub fn clear_mask(&mut self) {
        self.stroke.end();
        self.surfaces.clear_mask();
        self.refresh_highlight();
        self.mask_present = false;
    }

    pub fn feather(&mut self) -> bool {
        let radius = self.physical(self.config.feather_radius);
        self.refine("feather", |mask| morphology::feather(mask, radius))
    }

    pub fn expand(&mut self) -> bool {
        let radius = self.physical(self.config.morphology_radius);
        let strength = self.config.coverage_alpha;
        self.refine("expand", |mask| morphology::expand(mask, radius, strength))
    }

    pub fn contract(&mut self) -> bool {
        let radius = self.physical(self.config.morphology_radius);
        let strength = self.config.coverage_alpha;
        self.refine("contract", |mask| morphology::contract(mask, radius, strength))
    }

    /// Starts point segmentation for the object under `at`.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if a request is already in flight, or
    /// [`Error::Encode`] if the marked image cannot be encoded.
    pub fn begin_point_segmentation(&mut self, at: LogicalPoint) -> Result<PendingSegmentation> {
        let native = self.surfaces.layout().to_native(at);
        debug!(x = native.x, y = native.y, "point segmentation at native position");
        self.begin(SegmentationKind::Point, |editor| {
            SegmentationRequest::for_point(&editor.source, native, &editor.config)
        })
    }

    /// Starts whole-image segmentation (instance map for region picking).
    pub fn begin_whole_image_segmentation(&mut self) -> Result<PendingSegmentation> {
        self.begin(SegmentationKind::WholeImage, |editor| {
            Ok(SegmentationRequest::for_image(
                SegmentationKind::WholeImage,
                editor.source_inline.clone(),
            ))
        })
    }

    /// Starts subject segmentation.
    pub fn begin_subject_segmentation(&mut self) -> Result<PendingSegmentation> {
        self.begin(SegmentationKind::Subject, |editor| {
            Ok(SegmentationRequest::for_image(
                SegmentationKind::Subject,
                editor.source_inline.clone(),
            ))
        })
    }

    /// Applies the service's answer to a pending request and releases the
    /// busy flag.
    ///
    /// # Errors
    ///
    /// Returns the segmentation failure (also shown through
    /// [`MaskEditor::error`]); the mask is unchanged in that case.
    pub fn complete_segmentation(
        &mut self,
        pending: PendingSegmentation,
        reply: Result<ServiceReply>,
    ) -> Result<()> {
        let PendingSegmentation { request, _guard } = pending;
        let kind = request.kind;
        self.loading = None;

        let outcome = reply
            .and_then(|reply| reply.into_image(kind))
            .and_then(|image| self.apply_reply(kind, &image));
        match &outcome {
            Ok(()) => info!(?kind, mask_present = self.mask_present, "segmentation applied"),
            Err(e) => {
                warn!(?kind, error = %e, "segmentation failed");
                self.error = Some(e.to_string());
            }
        }
        outcome
    }

    #[instrument(skip_all, fields(x = at.x, y = at.y))]
    pub async fn segment_point<S: SegmentationService>(
        &mut self,
        service: &S,
        at: LogicalPoint,
    ) -> Result<()> {
        let pending = self.begin_point_segmentation(at)?;
        let reply = service.segment(pending.request()).await;
        self.complete_segmentation(pending, reply)
    }

    #[instrument(skip_all)]
    pub async fn auto_segment<S: SegmentationService>(&mut self, service: &S) -> Result<()> {
        let pending = self.begin_whole_image_segmentation()?;
        let reply = service.segment(pending.request()).await;
        self.complete_segmentation(pending, reply)
    }

    #[instrument(skip_all)]
    pub async fn segment_subject<S: SegmentationService>(&mut self, service: &S) -> Result<()> {
        let pending = self.begin_subject_segmentation()?;
        let reply = service.segment(pending.request()).await;
        self.complete_segmentation(pending, reply)
    }

    /// The binarized mask at native resolution.
    pub fn export_mask(&self) -> RgbaImage {
        export::export_mask(self.surfaces.mask(), self.surfaces.layout().native_size())
    }

    /// Ends the session with the exported mask as inline PNG.
    pub fn save(self) -> Result<InlineImage> {
        let png = export::export_png(self.surfaces.mask(), self.surfaces.layout().native_size())?;
        info!(bytes = png.data.len(), "mask saved");
        Ok(png)
    }

    /// Ends the session without output.
    pub fn cancel(self) {
        info!("mask editing cancelled");
    }

    fn begin(
        &mut self,
        kind: SegmentationKind,
        build: impl FnOnce(&Self) -> Result<SegmentationRequest>,
    ) -> Result<PendingSegmentation> {
        let guard = self.busy.try_acquire()?;
        self.error = None;
        self.stroke.end();
        self.dismiss_map();

        let request = match build(self) {
            Ok(request) => request,
            Err(e) => {
                warn!(?kind, error = %e, "could not prepare segmentation request");
                self.error = Some(e.to_string());
                return Err(e);
            }
        };
        self.loading = Some(kind.loading_message());
        info!(?kind, "segmentation started");
        Ok(PendingSegmentation {
            request,
            _guard: guard,
        })
    }

    fn apply_reply(&mut self, kind: SegmentationKind, image: &InlineImage) -> Result<()> {
        let failure = if kind.writes_mask() {
            "Failed to load generated mask image."
        } else {
            "Failed to load segmentation map."
        };
        let decoded = image
            .decode()
            .map_err(|_| Error::Segmentation(failure.to_string()))?
            .to_rgba8();

        if kind.writes_mask() {
            let coverage = segmentation::colorize(&decoded, self.config.coverage_alpha_u8());
            self.surfaces.replace_mask(&coverage);
            self.refresh_presence();
        } else {
            self.surfaces.show_detection(&decoded);
            self.mode = InputMode::RegionPick {
                resume: self.mode.base_tool(),
                picker: RegionPicker::new(decoded),
            };
        }
        Ok(())
    }

    /// Adds the hovered region to the mask; the map is dismissed either way.
    fn pick_region(&mut self) -> PointerAction {
        let picked = match &self.mode {
            InputMode::RegionPick { picker, .. } => {
                picker.pick(self.surfaces.detection(), self.config.match_tolerance)
            }
            InputMode::Tool(_) => None,
        };
        self.dismiss_map();
        let Some(region) = picked else {
            return PointerAction::MapDismissed;
        };
        let coverage = segmentation::colorize(&region, self.config.coverage_alpha_u8());
        self.surfaces.composite_onto_mask(&coverage, FilterType::Nearest);
        self.refresh_presence();
        debug!(mask_present = self.mask_present, "region picked");
        PointerAction::RegionPicked
    }

    fn paint(&mut self, at: LogicalPoint) -> PointerAction {
        let layout = *self.surfaces.layout();
        let mode = match self.mode.base_tool() {
            Tool::Eraser => BrushMode::Subtract,
            _ => BrushMode::Add,
        };
        let brush = Brush {
            width: layout.to_physical_length(self.brush_size as f32),
            mode,
            coverage_alpha: self.config.coverage_alpha_u8(),
        };
        if self
            .stroke
            .extend(self.surfaces.mask_mut(), layout.to_physical(at), &brush)
        {
            PointerAction::Painted
        } else {
            PointerAction::None
        }
    }

    fn refine(&mut self, name: &str, op: impl FnOnce(&mut RgbaImage) -> bool) -> bool {
        if !self.mask_present || self.busy.is_set() {
            return false;
        }
        self.stroke.end();
        if !op(self.surfaces.mask_mut()) {
            return false;
        }
        self.pulse_started = Some(Instant::now());
        self.refresh_presence();
        debug!(operation = name, mask_present = self.mask_present, "mask refined");
        true
    }

    fn dismiss_map(&mut self) {
        if let InputMode::RegionPick { resume, .. } = self.mode {
            self.mode = InputMode::Tool(resume);
            self.surfaces.clear_detection();
            self.surfaces.set_highlight(None);
        }
    }

    fn refresh_highlight(&mut self) {
        let highlight = match &self.mode {
            InputMode::RegionPick { picker, .. } => picker.highlight(
                self.surfaces.detection(),
                self.surfaces.mask(),
                self.config.match_tolerance,
                self.config.coverage_alpha_u8(),
            ),
            InputMode::Tool(_) => None,
        };
        self.surfaces.set_highlight(highlight);
    }

    fn refresh_presence(&mut self) {
        self.mask_present = self.surfaces.has_coverage();
    }

    fn physical(&self, logical: f32) -> f32 {
        self.surfaces.layout().to_physical_length(logical)
    }
}
