use std::future::Future;
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use mask_refine::{
    ActiveTool, EditorConfig, Error, InlineImage, LogicalPoint, MaskEditor, PointerAction, Result,
    SegmentationKind, SegmentationRequest, SegmentationService, ServiceReply, Tool, Viewport,
    generate_contrasting_colors,
};

/// What the fake service answers with.
#[derive(Clone)]
enum Script {
    Reply(ServiceReply),
    Fail(&'static str),
}

/// In-memory segmentation service that records every request.
struct FakeService {
    script: Script,
    seen: Mutex<Vec<SegmentationRequest>>,
}

impl FakeService {
    fn new(script: Script) -> Self {
        Self {
            script,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn replying_with(image: &RgbaImage) -> Self {
        Self::new(Script::Reply(ServiceReply::Image(png(image))))
    }

    fn requests(&self) -> Vec<SegmentationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl SegmentationService for FakeService {
    fn segment(
        &self,
        request: &SegmentationRequest,
    ) -> impl Future<Output = Result<ServiceReply>> + Send {
        self.seen.lock().unwrap().push(request.clone());
        let script = self.script.clone();
        async move {
            tokio::task::yield_now().await;
            match script {
                Script::Reply(reply) => Ok(reply),
                Script::Fail(message) => Err(Error::Segmentation(message.to_string())),
            }
        }
    }
}

fn png(image: &RgbaImage) -> InlineImage {
    InlineImage::encode_png(image).unwrap()
}

const NATIVE: (u32, u32) = (800, 600);

/// 800x600 source inside a 400x300 container at device pixel ratio 1.
fn open_editor() -> MaskEditor {
    let source = RgbaImage::from_fn(NATIVE.0, NATIVE.1, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    MaskEditor::open(
        png(&source),
        None,
        Viewport::new(400.0, 300.0, 1.0),
        EditorConfig::default(),
    )
    .unwrap()
}

fn paint(editor: &mut MaskEditor, points: &[(f32, f32)]) {
    let mut points = points.iter().map(|&(x, y)| LogicalPoint::new(x, y));
    if let Some(first) = points.next() {
        editor.pointer_down(first);
    }
    for point in points {
        editor.pointer_move(point);
    }
    editor.pointer_up();
}

#[test]
fn mask_presence_follows_every_mutation() {
    let mut editor = open_editor();
    assert!(!editor.mask_present());

    paint(&mut editor, &[(100.0, 100.0), (140.0, 120.0), (180.0, 100.0)]);
    assert!(editor.mask_present());
    let controls = editor.controls();
    assert!(controls.refine && controls.clear && controls.save);

    editor.select_tool(Tool::Eraser).unwrap();
    editor.set_brush_size(150);
    paint(&mut editor, &[(90.0, 110.0), (190.0, 110.0)]);
    assert!(!editor.mask_present());
    assert!(!editor.controls().save);
    assert!(!editor.expand());
}

#[tokio::test]
async fn failed_auto_segment_leaves_the_mask_and_restores_controls() {
    let mut editor = open_editor();
    paint(&mut editor, &[(50.0, 50.0), (80.0, 50.0)]);
    let before = editor.surfaces().mask().clone();

    let pending = editor.begin_whole_image_segmentation().unwrap();
    let request = pending.request().clone();
    let service = Arc::new(FakeService::new(Script::Fail("The model is overloaded.")));
    let call = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.segment(&request).await })
    };

    assert!(editor.is_loading());
    let controls = editor.controls();
    assert!(!controls.point_select);
    assert!(!controls.segment_subject);
    assert!(!controls.auto_segment);
    assert!(matches!(editor.begin_subject_segmentation(), Err(Error::Busy)));
    assert!(matches!(
        editor.begin_point_segmentation(LogicalPoint::new(10.0, 10.0)),
        Err(Error::Busy)
    ));

    let reply = call.await.unwrap();
    let err = editor.complete_segmentation(pending, reply).unwrap_err();
    assert_eq!(err.to_string(), "The model is overloaded.");
    assert_eq!(editor.error(), Some("The model is overloaded."));
    assert!(!editor.is_loading());
    assert!(editor.controls().point_select);
    assert!(editor.controls().segment_subject);
    assert_eq!(editor.surfaces().mask(), &before);
    assert_eq!(editor.active_tool(), ActiveTool::Brush);
}

#[tokio::test]
async fn point_select_marks_the_native_position() {
    let mut editor = open_editor();
    editor.select_tool(Tool::PointSelect).unwrap();

    let click = LogicalPoint::new(100.0, 100.0);
    let PointerAction::PointSegmentationRequested(at) = editor.pointer_down(click) else {
        panic!("point select should request segmentation");
    };
    assert_eq!(editor.layout().to_native(at), imageproc::point::Point::new(200, 200));

    let mut object = RgbaImage::from_pixel(NATIVE.0, NATIVE.1, Rgba([0, 0, 0, 255]));
    draw_filled_rect_mut(&mut object, Rect::at(150, 150).of_size(100, 100), Rgba([255, 255, 255, 255]));
    let service = FakeService::replying_with(&object);
    editor.segment_point(&service, at).await.unwrap();

    let requests = service.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, SegmentationKind::Point);
    assert_eq!(requests[0].instruction, SegmentationKind::Point.instruction());
    let marked = requests[0].image.decode().unwrap().to_rgb8();
    assert_eq!(marked.dimensions(), NATIVE);
    let center = marked.get_pixel(200, 200);
    assert!(center[0] > center[1] + 50, "marker missing: {center:?}");

    assert!(editor.mask_present());
    assert_eq!(editor.surfaces().mask().get_pixel(100, 100)[3], 179);
    assert_eq!(editor.surfaces().mask().get_pixel(20, 20)[3], 0);
    assert_eq!(editor.active_tool(), ActiveTool::PointSelect);
}

#[tokio::test]
async fn region_pick_covers_exactly_the_matching_pixels() {
    let mut editor = open_editor();
    let palette = generate_contrasting_colors(3, 255);
    let mut map = RgbaImage::from_pixel(NATIVE.0, NATIVE.1, Rgba([0, 0, 0, 255]));
    for (i, color) in palette.iter().enumerate() {
        let rect = Rect::at(100 + 200 * i as i32, 200).of_size(150, 200);
        draw_filled_rect_mut(&mut map, rect, *color);
    }
    let service = FakeService::replying_with(&map);

    editor.auto_segment(&service).await.unwrap();
    assert_eq!(editor.active_tool(), ActiveTool::RegionPick);
    assert!(!editor.mask_present());

    // Second object: native (300..450, 200..400), surface (150..225, 100..200).
    let over_second = LogicalPoint::new(180.0, 150.0);
    editor.pointer_move(over_second);
    assert!(editor.hovered_color().is_some());
    assert_eq!(editor.pointer_down(over_second), PointerAction::RegionPicked);

    let expected = palette[1];
    let detection_at = |x: u32, y: u32| {
        let native = (x * 2, y * 2);
        *map.get_pixel(native.0, native.1)
    };
    for (x, y, pixel) in editor.surfaces().mask().enumerate_pixels() {
        let inside = detection_at(x, y) == expected;
        assert_eq!(pixel[3] > 0, inside, "coverage mismatch at ({x}, {y})");
    }
    assert!(editor.mask_present());
    assert_eq!(editor.active_tool(), ActiveTool::Brush);
}

#[tokio::test]
async fn subject_segmentation_then_save_is_binary_at_native_size() {
    let mut editor = open_editor();
    let mut subject = RgbaImage::from_pixel(NATIVE.0, NATIVE.1, Rgba([0, 0, 0, 255]));
    draw_filled_rect_mut(&mut subject, Rect::at(200, 100).of_size(400, 400), Rgba([255, 255, 255, 255]));
    let service = FakeService::replying_with(&subject);

    editor.segment_subject(&service).await.unwrap();
    assert_eq!(service.requests()[0].image.mime_type, "image/png");
    assert!(editor.feather());

    let saved = editor.save().unwrap();
    assert_eq!(saved.mime_type, "image/png");
    assert!(saved.to_data_url().starts_with("data:image/png;base64,"));
    let mask = saved.decode().unwrap().to_rgba8();
    assert_eq!(mask.dimensions(), NATIVE);
    assert!(
        mask.pixels()
            .all(|p| *p == Rgba([255, 255, 255, 255]) || *p == Rgba([0, 0, 0, 255]))
    );
    assert_eq!(*mask.get_pixel(400, 300), Rgba([255, 255, 255, 255]));
    assert_eq!(*mask.get_pixel(20, 20), Rgba([0, 0, 0, 255]));
}

#[test]
fn reopening_with_a_saved_mask_restores_coverage() {
    let mut editor = open_editor();
    paint(&mut editor, &[(100.0, 100.0), (300.0, 200.0)]);
    let saved = editor.save().unwrap();

    let source = RgbaImage::from_pixel(NATIVE.0, NATIVE.1, Rgba([40, 40, 40, 255]));
    let reopened = MaskEditor::open(
        png(&source),
        Some(&saved),
        Viewport::new(400.0, 300.0, 1.0),
        EditorConfig::default(),
    )
    .unwrap();
    assert!(reopened.mask_present());
    assert!(reopened.error().is_none());
    assert!(reopened.surfaces().mask().get_pixel(200, 150)[3] > 0);
    assert_eq!(reopened.surfaces().mask().get_pixel(380, 20)[3], 0);
}
