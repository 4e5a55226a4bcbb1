use crate::canvas::{Canvas, Document};
use crate::content::{ContentItem, ContentKind, ImageEncoding, ImageOptions};
use crate::debug::DebugLogger;
use crate::decode::ImageDecoder;
use crate::dom::{BreakHint, Dom, ElementId, WidthOverride};
use crate::error::PagePressError;
use crate::frame::Frame;
use crate::metrics::{ComposeMetrics, PageMetrics};
use crate::raster::{Bitmap, PX_PER_MM, RasterOptions, Rasterizer};
use crate::types::{Margins, Mm, Size};
use std::time::Instant;

/// Vertical spacing appended after a placed image, in page millimeters.
const IMAGE_GUTTER: f32 = 10.0;
/// Vertical spacing appended after a placed element.
const ELEMENT_GUTTER: f32 = 5.0;

/// Page geometry resolved once per run from the validated options; never
/// re-read from raw caller input mid-run.
#[derive(Debug, Clone)]
pub(crate) struct PageGeometry {
    pub page_size: Size,
    pub margins: Margins,
    pub scale: f32,
    pub page_break: bool,
    pub fixed_width: Option<Mm>,
    pub image_quality: f32,
    pub background: [u8; 3],
}

impl PageGeometry {
    pub fn usable_width(&self) -> Mm {
        (self.page_size.width - self.margins.left - self.margins.right).max(Mm::ZERO)
    }

    /// Content width fragments are laid out against: the usable width,
    /// clamped by the fixed-width override when one is set.
    pub fn effective_width(&self) -> Mm {
        match self.fixed_width {
            Some(fixed) => fixed.min(self.usable_width()),
            None => self.usable_width(),
        }
    }
}

enum Fragment {
    Image {
        source: String,
        options: ImageOptions,
    },
    Element(ElementId),
}

pub(crate) fn compose(
    geometry: &PageGeometry,
    items: &[ContentItem],
    dom: &dyn Dom,
    rasterizer: &dyn Rasterizer,
    decoder: &dyn ImageDecoder,
    debug: Option<&DebugLogger>,
) -> Result<(Document, ComposeMetrics), PagePressError> {
    let start = Instant::now();
    let mut metrics = ComposeMetrics::default();

    // The root container must be attached even when an explicit content
    // list makes the children fallback unnecessary.
    let root_children = dom.root_children().ok_or(PagePressError::MissingRoot)?;
    let fragments = resolve_fragments(items, root_children, dom, debug, &mut metrics);

    let mut canvas = Canvas::new(geometry.page_size);
    let mut frame = Frame::new(geometry.page_size, geometry.margins);
    let mut page_number = 1usize;
    let mut page_fragments = 0usize;

    for fragment in fragments {
        match fragment {
            Fragment::Image { source, options } => {
                let bitmap = match decoder.decode(&source) {
                    Ok(bitmap) => bitmap,
                    Err(err) => {
                        if let Some(logger) = debug {
                            logger.event("compose.decode_failed", &format!("{source}: {err}"));
                            logger.increment("compose.decode_failed", 1);
                        }
                        metrics.skipped_fragments += 1;
                        continue;
                    }
                };
                place_image(
                    geometry,
                    &mut canvas,
                    &mut frame,
                    &mut page_number,
                    &mut page_fragments,
                    &mut metrics,
                    debug,
                    bitmap,
                    &options,
                );
            }
            Fragment::Element(element) => {
                if !dom.is_rendered(element) {
                    if let Some(logger) = debug {
                        logger.increment("compose.hidden_skipped", 1);
                    }
                    metrics.skipped_fragments += 1;
                    continue;
                }
                let hint = dom.break_hint(element);
                if geometry.page_break
                    && hint == Some(BreakHint::Before)
                    && !frame.is_at_top()
                {
                    start_new_page(
                        &mut canvas,
                        &mut frame,
                        &mut page_number,
                        &mut page_fragments,
                        &mut metrics,
                        debug,
                        "break_before",
                    );
                }
                let bitmap = rasterize_element(geometry, dom, rasterizer, element)?;
                place_element(
                    geometry,
                    &mut canvas,
                    &mut frame,
                    &mut page_number,
                    &mut page_fragments,
                    &mut metrics,
                    debug,
                    bitmap,
                );
                if geometry.page_break && hint == Some(BreakHint::After) {
                    start_new_page(
                        &mut canvas,
                        &mut frame,
                        &mut page_number,
                        &mut page_fragments,
                        &mut metrics,
                        debug,
                        "break_after",
                    );
                }
                frame.advance(Mm::from_f32(ELEMENT_GUTTER));
            }
        }
    }

    if !canvas.is_current_empty() || metrics.pages.is_empty() {
        metrics.pages.push(PageMetrics {
            page_number,
            fragment_count: page_fragments,
            command_count: canvas.current_command_count(),
        });
    }
    metrics.total_ms = start.elapsed().as_secs_f64() * 1000.0;

    if let Some(logger) = debug {
        logger.emit_summary("compose");
        logger.flush();
    }

    Ok((canvas.finish(), metrics))
}

fn resolve_fragments(
    items: &[ContentItem],
    root_children: Vec<ElementId>,
    dom: &dyn Dom,
    debug: Option<&DebugLogger>,
    metrics: &mut ComposeMetrics,
) -> Vec<Fragment> {
    if items.is_empty() {
        return root_children.into_iter().map(Fragment::Element).collect();
    }
    let mut fragments = Vec::new();
    for item in items {
        match item.kind {
            ContentKind::Image => fragments.push(Fragment::Image {
                source: item.selector.clone(),
                options: item.image_options.unwrap_or_default(),
            }),
            ContentKind::Element if item.expand_all => {
                fragments.extend(dom.query_all(&item.selector).into_iter().map(Fragment::Element));
            }
            ContentKind::Element => match dom.query_first(&item.selector) {
                Some(element) => fragments.push(Fragment::Element(element)),
                None => {
                    if let Some(logger) = debug {
                        logger.event("compose.skip", &format!("no match for {}", item.selector));
                        logger.increment("compose.selector_missed", 1);
                    }
                    metrics.skipped_fragments += 1;
                }
            },
        }
    }
    fragments
}

fn rasterize_element(
    geometry: &PageGeometry,
    dom: &dyn Dom,
    rasterizer: &dyn Rasterizer,
    element: ElementId,
) -> Result<Bitmap, PagePressError> {
    let mut options = RasterOptions {
        scale: geometry.scale,
        viewport_width_px: None,
        image_quality: geometry.image_quality,
        background: geometry.background,
    };
    // Guard restores the element's layout width on every exit path,
    // including a rasterizer failure.
    let _guard = geometry.fixed_width.map(|fixed| {
        let width_px = fixed.to_f32() * PX_PER_MM;
        options.viewport_width_px = Some(width_px);
        WidthOverride::apply(dom, element, width_px)
    });
    rasterizer
        .rasterize(element, &options)
        .map_err(PagePressError::Raster)
}

#[allow(clippy::too_many_arguments)]
fn place_image(
    geometry: &PageGeometry,
    canvas: &mut Canvas,
    frame: &mut Frame,
    page_number: &mut usize,
    page_fragments: &mut usize,
    metrics: &mut ComposeMetrics,
    debug: Option<&DebugLogger>,
    bitmap: Bitmap,
    options: &ImageOptions,
) {
    let (width, height) = image_dimensions(options, &bitmap, geometry.effective_width());
    let x = options
        .x
        .map(Mm::from_f32)
        .unwrap_or(geometry.margins.left);
    let src_height_px = bitmap.height_px;
    let image = canvas.register_image(bitmap, options.encoding);
    canvas.draw_image(image, x, frame.cursor(), width, height, 0, src_height_px);
    metrics.placed_fragments += 1;
    *page_fragments += 1;
    frame.advance(height + Mm::from_f32(IMAGE_GUTTER));

    // The overflow check runs after placement, so an image may run past
    // the bottom margin; only the next fragment moves to a fresh page.
    if geometry.page_break && frame.is_exhausted() {
        start_new_page(
            canvas,
            frame,
            page_number,
            page_fragments,
            metrics,
            debug,
            "image_overflow",
        );
    }
}

/// Target size of an image fragment. Explicit dimensions win over the
/// aspect-ratio flag; a single dimension with aspect preserved derives the
/// other from the natural ratio; with neither given the image spans the
/// content width or its natural width, whichever is smaller.
fn image_dimensions(options: &ImageOptions, bitmap: &Bitmap, content_width: Mm) -> (Mm, Mm) {
    let aspect = bitmap.aspect_ratio();
    match (options.width, options.height) {
        (Some(width), Some(height)) => (Mm::from_f32(width), Mm::from_f32(height)),
        (Some(width), None) => {
            let width = Mm::from_f32(width);
            let height = if options.preserve_aspect_ratio {
                width / aspect
            } else {
                content_width
            };
            (width, height)
        }
        (None, Some(height)) => {
            let height = Mm::from_f32(height);
            let width = if options.preserve_aspect_ratio {
                height * aspect
            } else {
                content_width
            };
            (width, height)
        }
        (None, None) => {
            let width = content_width.min(Mm::from_f32(bitmap.width_px as f32));
            (width, width / aspect)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn place_element(
    geometry: &PageGeometry,
    canvas: &mut Canvas,
    frame: &mut Frame,
    page_number: &mut usize,
    page_fragments: &mut usize,
    metrics: &mut ComposeMetrics,
    debug: Option<&DebugLogger>,
    bitmap: Bitmap,
) {
    let placed_width = geometry.effective_width();
    let placed_height =
        placed_width * (bitmap.height_px as f32 / bitmap.width_px.max(1) as f32);
    let height_px = bitmap.height_px;
    let image = canvas.register_image(bitmap, ImageEncoding::Png);

    if placed_height > frame.usable_height() {
        // Slice across pages: each slice fills what is left of the current
        // page; the band offsets stay contiguous so no pixel row is lost
        // or drawn twice.
        let mut consumed = Mm::ZERO;
        loop {
            if !frame.remaining_height().is_positive() {
                start_new_page(
                    canvas,
                    frame,
                    page_number,
                    page_fragments,
                    metrics,
                    debug,
                    "slice_continuation",
                );
            }
            let take = frame.remaining_height().min(placed_height - consumed);
            let src_start = band_offset_px(consumed, placed_height, height_px);
            let src_end = band_offset_px(consumed + take, placed_height, height_px);
            if src_end > src_start {
                canvas.draw_image(
                    image,
                    geometry.margins.left,
                    frame.cursor(),
                    placed_width,
                    take,
                    src_start,
                    src_end - src_start,
                );
            }
            consumed += take;
            if consumed < placed_height {
                start_new_page(
                    canvas,
                    frame,
                    page_number,
                    page_fragments,
                    metrics,
                    debug,
                    "slice_continuation",
                );
            } else {
                frame.advance(take);
                break;
            }
        }
    } else {
        if geometry.page_break && !frame.fits(placed_height) {
            start_new_page(
                canvas,
                frame,
                page_number,
                page_fragments,
                metrics,
                debug,
                "element_overflow",
            );
        }
        canvas.draw_image(
            image,
            geometry.margins.left,
            frame.cursor(),
            placed_width,
            placed_height,
            0,
            height_px,
        );
        frame.advance(placed_height);
    }

    metrics.placed_fragments += 1;
    *page_fragments += 1;
}

/// Pixel row corresponding to a vertical offset within the placed height,
/// rounded half-up. Monotone in `consumed`, exact at both ends, so
/// consecutive bands share their boundary row.
fn band_offset_px(consumed: Mm, total: Mm, height_px: u32) -> u32 {
    let total_milli = total.to_milli_i64().max(1) as i128;
    let consumed_milli = consumed.to_milli_i64().clamp(0, total_milli as i64) as i128;
    ((consumed_milli * height_px as i128 + total_milli / 2) / total_milli) as u32
}

fn start_new_page(
    canvas: &mut Canvas,
    frame: &mut Frame,
    page_number: &mut usize,
    page_fragments: &mut usize,
    metrics: &mut ComposeMetrics,
    debug: Option<&DebugLogger>,
    reason: &str,
) {
    metrics.pages.push(PageMetrics {
        page_number: *page_number,
        fragment_count: *page_fragments,
        command_count: canvas.current_command_count(),
    });
    if let Some(logger) = debug {
        logger.page_break(*page_number, *page_number + 1, reason);
    }
    canvas.show_page();
    frame.reset();
    *page_number += 1;
    *page_fragments = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::dom::StyleSnapshot;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeDom {
        selectors: HashMap<String, Vec<ElementId>>,
        root: Option<Vec<ElementId>>,
        hidden: Vec<ElementId>,
        hints: HashMap<ElementId, BreakHint>,
        style_log: RefCell<Vec<String>>,
    }

    impl FakeDom {
        fn new() -> Self {
            Self {
                selectors: HashMap::new(),
                root: Some(Vec::new()),
                hidden: Vec::new(),
                hints: HashMap::new(),
                style_log: RefCell::new(Vec::new()),
            }
        }

        fn with_selector(mut self, selector: &str, elements: &[u64]) -> Self {
            self.selectors.insert(
                selector.to_string(),
                elements.iter().copied().map(ElementId).collect(),
            );
            self
        }

        fn with_root(mut self, elements: &[u64]) -> Self {
            self.root = Some(elements.iter().copied().map(ElementId).collect());
            self
        }

        fn without_root(mut self) -> Self {
            self.root = None;
            self
        }

        fn with_hidden(mut self, element: u64) -> Self {
            self.hidden.push(ElementId(element));
            self
        }

        fn with_hint(mut self, element: u64, hint: BreakHint) -> Self {
            self.hints.insert(ElementId(element), hint);
            self
        }
    }

    impl Dom for FakeDom {
        fn query_all(&self, selector: &str) -> Vec<ElementId> {
            self.selectors.get(selector).cloned().unwrap_or_default()
        }

        fn root_children(&self) -> Option<Vec<ElementId>> {
            self.root.clone()
        }

        fn is_rendered(&self, element: ElementId) -> bool {
            !self.hidden.contains(&element)
        }

        fn break_hint(&self, element: ElementId) -> Option<BreakHint> {
            self.hints.get(&element).copied()
        }

        fn override_width(&self, element: ElementId, width_px: f32) -> StyleSnapshot {
            self.style_log
                .borrow_mut()
                .push(format!("override {} {}", element.0, width_px));
            StyleSnapshot::default()
        }

        fn restore_style(&self, element: ElementId, _snapshot: StyleSnapshot) {
            self.style_log
                .borrow_mut()
                .push(format!("restore {}", element.0));
        }
    }

    struct FakeRasterizer {
        /// Pixel size per element; elements not listed fail to rasterize.
        sizes: HashMap<ElementId, (u32, u32)>,
    }

    impl FakeRasterizer {
        fn new(sizes: &[(u64, u32, u32)]) -> Self {
            Self {
                sizes: sizes
                    .iter()
                    .map(|&(id, w, h)| (ElementId(id), (w, h)))
                    .collect(),
            }
        }
    }

    impl Rasterizer for FakeRasterizer {
        fn rasterize(
            &self,
            element: ElementId,
            _options: &RasterOptions,
        ) -> Result<Bitmap, String> {
            let (width_px, height_px) = self
                .sizes
                .get(&element)
                .copied()
                .ok_or_else(|| format!("element {} not capturable", element.0))?;
            Ok(Bitmap {
                width_px,
                height_px,
                data: vec![element.0 as u8; 16],
            })
        }
    }

    struct FakeDecoder {
        images: HashMap<String, (u32, u32)>,
    }

    impl FakeDecoder {
        fn new(images: &[(&str, u32, u32)]) -> Self {
            Self {
                images: images
                    .iter()
                    .map(|&(src, w, h)| (src.to_string(), (w, h)))
                    .collect(),
            }
        }

        fn empty() -> Self {
            Self {
                images: HashMap::new(),
            }
        }
    }

    impl ImageDecoder for FakeDecoder {
        fn decode(&self, source: &str) -> Result<Bitmap, String> {
            let (width_px, height_px) = self
                .images
                .get(source)
                .copied()
                .ok_or_else(|| format!("no image at {source}"))?;
            Ok(Bitmap {
                width_px,
                height_px,
                data: source.as_bytes().to_vec(),
            })
        }
    }

    fn geometry() -> PageGeometry {
        PageGeometry {
            page_size: Size::a4(),
            margins: Margins::all(10.0),
            scale: 2.0,
            page_break: true,
            fixed_width: None,
            image_quality: 1.0,
            background: [255, 255, 255],
        }
    }

    fn flatten(doc: &Document) -> Vec<&Command> {
        doc.pages.iter().flat_map(|p| p.commands.iter()).collect()
    }

    fn image_order(doc: &Document) -> Vec<usize> {
        flatten(doc)
            .iter()
            .map(|cmd| match cmd {
                Command::DrawImage { image, .. } => *image,
            })
            .collect()
    }

    #[test]
    fn fragments_keep_input_order_across_expansion() {
        let dom = FakeDom::new()
            .with_selector(".row", &[4, 5])
            .with_selector("#top", &[1]);
        let rasterizer = FakeRasterizer::new(&[(1, 100, 50), (4, 100, 50), (5, 100, 50)]);
        let decoder = FakeDecoder::new(&[("a.png", 50, 50)]);
        let items = vec![
            ContentItem::element("#top"),
            ContentItem::image("a.png"),
            ContentItem::elements(".row"),
        ];
        let (doc, metrics) =
            compose(&geometry(), &items, &dom, &rasterizer, &decoder, None).expect("compose");

        // Four placements, each registering a distinct resource in order.
        assert_eq!(image_order(&doc), vec![0, 1, 2, 3]);
        assert_eq!(metrics.placed_fragments, 4);
        assert_eq!(metrics.skipped_fragments, 0);
    }

    #[test]
    fn empty_content_falls_back_to_root_children() {
        let dom = FakeDom::new().with_root(&[7, 8]);
        let rasterizer = FakeRasterizer::new(&[(7, 100, 40), (8, 100, 40)]);
        let (_, metrics) = compose(
            &geometry(),
            &[],
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");
        assert_eq!(metrics.placed_fragments, 2);
    }

    #[test]
    fn missing_root_is_fatal_even_with_explicit_content() {
        let dom = FakeDom::new().without_root();
        let err = compose(
            &geometry(),
            &[ContentItem::image("a.png")],
            &dom,
            &FakeRasterizer::new(&[]),
            &FakeDecoder::new(&[("a.png", 10, 10)]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PagePressError::MissingRoot));
    }

    #[test]
    fn missing_selector_skips_without_aborting() {
        let dom = FakeDom::new().with_selector("#real", &[1]);
        let rasterizer = FakeRasterizer::new(&[(1, 100, 50)]);
        let items = vec![
            ContentItem::element("#ghost"),
            ContentItem::element("#real"),
        ];
        let (doc, metrics) = compose(
            &geometry(),
            &items,
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");
        assert_eq!(doc.page_count(), 1);
        assert_eq!(metrics.placed_fragments, 1);
        assert_eq!(metrics.skipped_fragments, 1);
    }

    #[test]
    fn hidden_element_is_skipped() {
        let dom = FakeDom::new()
            .with_selector("div", &[1, 2])
            .with_hidden(1);
        let rasterizer = FakeRasterizer::new(&[(1, 100, 50), (2, 100, 50)]);
        let (_, metrics) = compose(
            &geometry(),
            &[ContentItem::elements("div")],
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");
        assert_eq!(metrics.placed_fragments, 1);
        assert_eq!(metrics.skipped_fragments, 1);
    }

    #[test]
    fn decode_failure_skips_fragment_and_continues() {
        let dom = FakeDom::new().with_selector("#after", &[1]);
        let rasterizer = FakeRasterizer::new(&[(1, 100, 50)]);
        let items = vec![
            ContentItem::image("broken.png"),
            ContentItem::element("#after"),
        ];
        let (doc, metrics) = compose(
            &geometry(),
            &items,
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");
        assert_eq!(metrics.skipped_fragments, 1);
        assert_eq!(metrics.placed_fragments, 1);
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn raster_failure_propagates_and_restores_style() {
        let dom = FakeDom::new().with_selector("#big", &[9]);
        let mut geometry = geometry();
        geometry.fixed_width = Some(Mm::from_f32(150.0));
        let err = compose(
            &geometry,
            &[ContentItem::element("#big")],
            &dom,
            &FakeRasterizer::new(&[]),
            &FakeDecoder::empty(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PagePressError::Raster(_)));
        let log = dom.style_log.borrow();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("override 9"));
        assert_eq!(log[1], "restore 9");
    }

    #[test]
    fn aspect_ratio_derivation_from_width() {
        let bitmap = Bitmap {
            width_px: 200,
            height_px: 100,
            data: Vec::new(),
        };
        let options = ImageOptions {
            width: Some(100.0),
            ..ImageOptions::default()
        };
        let (w, h) = image_dimensions(&options, &bitmap, Mm::from_f32(190.0));
        assert_eq!(w, Mm::from_f32(100.0));
        assert_eq!(h, Mm::from_f32(50.0));
    }

    #[test]
    fn aspect_ratio_derivation_from_height() {
        let bitmap = Bitmap {
            width_px: 200,
            height_px: 100,
            data: Vec::new(),
        };
        let options = ImageOptions {
            height: Some(50.0),
            ..ImageOptions::default()
        };
        let (w, h) = image_dimensions(&options, &bitmap, Mm::from_f32(190.0));
        assert_eq!(w, Mm::from_f32(100.0));
        assert_eq!(h, Mm::from_f32(50.0));
    }

    #[test]
    fn explicit_dimensions_ignore_aspect_flag() {
        let bitmap = Bitmap {
            width_px: 200,
            height_px: 100,
            data: Vec::new(),
        };
        let options = ImageOptions {
            width: Some(30.0),
            height: Some(120.0),
            preserve_aspect_ratio: true,
            ..ImageOptions::default()
        };
        let (w, h) = image_dimensions(&options, &bitmap, Mm::from_f32(190.0));
        assert_eq!(w, Mm::from_f32(30.0));
        assert_eq!(h, Mm::from_f32(120.0));
    }

    #[test]
    fn unsized_image_clamps_to_content_width() {
        let wide = Bitmap {
            width_px: 1000,
            height_px: 500,
            data: Vec::new(),
        };
        let (w, h) = image_dimensions(&ImageOptions::default(), &wide, Mm::from_f32(190.0));
        assert_eq!(w, Mm::from_f32(190.0));
        assert_eq!(h, Mm::from_f32(95.0));

        let narrow = Bitmap {
            width_px: 100,
            height_px: 50,
            data: Vec::new(),
        };
        let (w, h) = image_dimensions(&ImageOptions::default(), &narrow, Mm::from_f32(190.0));
        assert_eq!(w, Mm::from_f32(100.0));
        assert_eq!(h, Mm::from_f32(50.0));
    }

    #[test]
    fn overtall_element_slices_across_ceil_pages() {
        // Usable height is 277mm; the element lays out at 190mm wide and
        // 2.5 pages tall, so three pages are consumed.
        let dom = FakeDom::new().with_selector("#tall", &[1]);
        let height_px = (277.0_f32 * 2.5 / 190.0 * 1900.0) as u32;
        let rasterizer = FakeRasterizer::new(&[(1, 1900, height_px)]);
        let (doc, _) = compose(
            &geometry(),
            &[ContentItem::element("#tall")],
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");

        assert_eq!(doc.page_count(), 3);
        let commands = flatten(&doc);
        assert_eq!(commands.len(), 3);

        let mut total_height = Mm::ZERO;
        let mut expected_start = 0u32;
        for cmd in &commands {
            let Command::DrawImage {
                y,
                height,
                src_y_px,
                src_height_px,
                ..
            } = cmd;
            assert_eq!(*src_y_px, expected_start, "bands must stay contiguous");
            expected_start = src_y_px + src_height_px;
            total_height += *height;
            assert!(*y >= Mm::from_f32(10.0));
        }
        assert_eq!(expected_start, height_px, "no trailing rows dropped");

        let placed_height = Mm::from_f32(190.0) * (height_px as f32 / 1900.0);
        assert_eq!(total_height.to_milli_i64(), placed_height.to_milli_i64());
    }

    #[test]
    fn slicing_happens_even_with_page_break_disabled() {
        let dom = FakeDom::new().with_selector("#tall", &[1]);
        let rasterizer = FakeRasterizer::new(&[(1, 1900, 6000)]);
        let mut geometry = geometry();
        geometry.page_break = false;
        let (doc, _) = compose(
            &geometry,
            &[ContentItem::element("#tall")],
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");
        assert!(doc.page_count() > 1);
    }

    #[test]
    fn fitting_element_breaks_before_placement_when_cursor_is_low() {
        // First element takes 200mm of the 277mm usable height; the second
        // needs 150mm and must start on page two, fully inside the margins.
        let dom = FakeDom::new().with_selector(".block", &[1, 2]);
        let rasterizer = FakeRasterizer::new(&[(1, 190, 200), (2, 190, 150)]);
        let (doc, _) = compose(
            &geometry(),
            &[ContentItem::elements(".block")],
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages[0].commands.len(), 1);
        assert_eq!(doc.pages[1].commands.len(), 1);
        let Command::DrawImage { y, .. } = &doc.pages[1].commands[0];
        assert_eq!(*y, Mm::from_f32(10.0));
    }

    #[test]
    fn image_overflow_breaks_after_placement_not_before() {
        // A 280mm image overflows the 277mm usable height, but still lands
        // on page one; only the following fragment starts fresh.
        let dom = FakeDom::new().with_selector("#next", &[1]);
        let rasterizer = FakeRasterizer::new(&[(1, 190, 50)]);
        let decoder = FakeDecoder::new(&[("big.png", 190, 280)]);
        let items = vec![
            ContentItem::image("big.png").with_image_options(ImageOptions {
                width: Some(190.0),
                height: Some(280.0),
                ..ImageOptions::default()
            }),
            ContentItem::element("#next"),
        ];
        let (doc, _) =
            compose(&geometry(), &items, &dom, &rasterizer, &decoder, None).expect("compose");

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages[0].commands.len(), 1);
        assert_eq!(doc.pages[1].commands.len(), 1);
    }

    #[test]
    fn image_x_defaults_to_left_margin_and_honors_override() {
        let dom = FakeDom::new();
        let decoder = FakeDecoder::new(&[("a.png", 50, 50), ("b.png", 50, 50)]);
        let items = vec![
            ContentItem::image("a.png"),
            ContentItem::image("b.png").with_image_options(ImageOptions {
                x: Some(42.0),
                ..ImageOptions::default()
            }),
        ];
        let (doc, _) = compose(
            &geometry(),
            &items,
            &dom,
            &FakeRasterizer::new(&[]),
            &decoder,
            None,
        )
        .expect("compose");
        let commands = flatten(&doc);
        let Command::DrawImage { x: first_x, .. } = commands[0];
        let Command::DrawImage { x: second_x, .. } = commands[1];
        assert_eq!(*first_x, Mm::from_f32(10.0));
        assert_eq!(*second_x, Mm::from_f32(42.0));
    }

    #[test]
    fn break_hints_start_and_force_pages() {
        let dom = FakeDom::new()
            .with_selector(".a", &[1])
            .with_selector(".b", &[2])
            .with_selector(".c", &[3])
            .with_hint(2, BreakHint::Before)
            .with_hint(3, BreakHint::After);
        let rasterizer = FakeRasterizer::new(&[(1, 190, 40), (2, 190, 40), (3, 190, 40)]);
        let items = vec![
            ContentItem::element(".a"),
            ContentItem::element(".b"),
            ContentItem::element(".c"),
        ];
        let (doc, _) = compose(
            &geometry(),
            &items,
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");

        // .a on page one; .b breaks before; .c joins .b, then forces a
        // break whose trailing page stays unwritten and is dropped.
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages[0].commands.len(), 1);
        assert_eq!(doc.pages[1].commands.len(), 2);
    }

    #[test]
    fn break_before_at_top_of_page_is_a_no_op() {
        let dom = FakeDom::new()
            .with_selector(".a", &[1])
            .with_hint(1, BreakHint::Before);
        let rasterizer = FakeRasterizer::new(&[(1, 190, 40)]);
        let (doc, _) = compose(
            &geometry(),
            &[ContentItem::element(".a")],
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn fixed_width_clamps_placement_and_overrides_viewport() {
        let dom = FakeDom::new().with_selector("#el", &[5]);
        let rasterizer = FakeRasterizer::new(&[(5, 100, 50)]);
        let mut geometry = geometry();
        geometry.fixed_width = Some(Mm::from_f32(150.0));
        let (doc, _) = compose(
            &geometry,
            &[ContentItem::element("#el")],
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");
        let Command::DrawImage { width, .. } = &doc.pages[0].commands[0];
        assert_eq!(*width, Mm::from_f32(150.0));
        let log = dom.style_log.borrow();
        assert!(log[0].starts_with("override 5 567"));
    }

    #[test]
    fn metrics_track_pages_and_fragments() {
        let dom = FakeDom::new().with_selector(".block", &[1, 2]);
        let rasterizer = FakeRasterizer::new(&[(1, 190, 200), (2, 190, 150)]);
        let (_, metrics) = compose(
            &geometry(),
            &[ContentItem::elements(".block")],
            &dom,
            &rasterizer,
            &FakeDecoder::empty(),
            None,
        )
        .expect("compose");
        assert_eq!(metrics.pages.len(), 2);
        assert_eq!(metrics.pages[0].page_number, 1);
        assert_eq!(metrics.pages[0].fragment_count, 1);
        assert_eq!(metrics.pages[1].fragment_count, 1);
        assert_eq!(metrics.placed_fragments, 2);
    }
}
