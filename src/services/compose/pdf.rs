//! Thin drawing surface over `printpdf`. Callers pass top-left-origin points;
//! conversion to millimetres and the PDF's bottom-left origin happens here.

use super::layout::{PageGeometry, Rect, TextLine, BRAND};
use super::theme::Rgb;
use anyhow::{anyhow, Result};
use log::debug;
use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::lopdf::{self, Object, ObjectId};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Polygon,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::io::Cursor;

const IMAGE_DPI: f32 = 300.0;
const CIRCLE_SEGMENTS: usize = 24;

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
        None,
    ))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    bold_italic: IndirectFontRef,
}

impl Fonts {
    fn pick(&self, bold: bool, italic: bool) -> &IndirectFontRef {
        match (bold, italic) {
            (false, false) => &self.regular,
            (true, false) => &self.bold,
            (false, true) => &self.italic,
            (true, true) => &self.bold_italic,
        }
    }
}

pub struct PdfWriter {
    doc: PdfDocumentReference,
    page: PageGeometry,
    layer: PdfLayerReference,
    fonts: Fonts,
    pages: usize,
}

impl PdfWriter {
    /// Starts a document whose first page is already current.
    pub fn new(title: &str, subject: &str, page: PageGeometry) -> Result<Self> {
        let (doc, page_index, layer_index) =
            PdfDocument::new(title, mm(page.width), mm(page.height), "Page 1");
        let doc = doc.with_author(BRAND).with_subject(subject);
        let layer = doc.get_page(page_index).get_layer(layer_index);

        let font = |f: BuiltinFont| {
            doc.add_builtin_font(f)
                .map_err(|e| anyhow!("Failed to load built-in font: {:?}", e))
        };
        let fonts = Fonts {
            regular: font(BuiltinFont::Helvetica)?,
            bold: font(BuiltinFont::HelveticaBold)?,
            italic: font(BuiltinFont::HelveticaOblique)?,
            bold_italic: font(BuiltinFont::HelveticaBoldOblique)?,
        };

        Ok(Self {
            doc,
            page,
            layer,
            fonts,
            pages: 1,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    pub fn add_page(&mut self) {
        self.pages += 1;
        let name = format!("Page {}", self.pages);
        let (page_index, layer_index) =
            self.doc
                .add_page(mm(self.page.width), mm(self.page.height), name);
        self.layer = self.doc.get_page(page_index).get_layer(layer_index);
    }

    fn point(&self, x: f32, y: f32) -> Point {
        Point::new(mm(x), mm(self.page.height - y))
    }

    fn polygon(&self, points: &[(f32, f32)], fill: Rgb, outline: Option<(Rgb, f32)>) {
        let ring = points
            .iter()
            .map(|&(x, y)| (self.point(x, y), false))
            .collect();

        self.layer.set_fill_color(color(fill));
        let mode = match outline {
            Some((stroke, thickness)) => {
                self.layer.set_outline_color(color(stroke));
                self.layer.set_outline_thickness(thickness);
                PaintMode::FillStroke
            }
            None => PaintMode::Fill,
        };

        self.layer.add_polygon(Polygon {
            rings: vec![ring],
            mode,
            winding_order: WindingOrder::NonZero,
        });
    }

    pub fn fill_rect(&self, rect: Rect, fill: Rgb) {
        self.rect(rect, fill, None);
    }

    pub fn rect(&self, rect: Rect, fill: Rgb, outline: Option<(Rgb, f32)>) {
        self.polygon(
            &[
                (rect.x, rect.y),
                (rect.right(), rect.y),
                (rect.right(), rect.bottom()),
                (rect.x, rect.bottom()),
            ],
            fill,
            outline,
        );
    }

    pub fn fill_polygon(&self, points: &[(f32, f32)], fill: Rgb) {
        self.polygon(points, fill, None);
    }

    pub fn circle(&self, cx: f32, cy: f32, r: f32, fill: Rgb, outline: Option<(Rgb, f32)>) {
        let points: Vec<(f32, f32)> = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let a = 2.0 * PI * i as f32 / CIRCLE_SEGMENTS as f32;
                (cx + r * a.cos(), cy + r * a.sin())
            })
            .collect();
        self.polygon(&points, fill, outline);
    }

    pub fn text(&self, line: &TextLine, fill: Rgb) {
        if line.text.is_empty() {
            return;
        }
        self.layer.set_fill_color(color(fill));
        self.layer.use_text(
            line.text.as_str(),
            line.size,
            mm(line.x),
            mm(self.page.height - line.baseline),
            self.fonts.pick(line.bold, line.italic),
        );
    }

    /// Places a PNG so that it exactly covers `rect`.
    pub fn image(&self, png: &[u8], rect: Rect) -> Result<()> {
        let decoder = PngDecoder::new(Cursor::new(png))
            .map_err(|e| anyhow!("Failed to read PNG for PDF: {:?}", e))?;
        let image =
            Image::try_from(decoder).map_err(|e| anyhow!("Failed to embed image: {:?}", e))?;

        let px_w = image.image.width.0 as f32;
        let px_h = image.image.height.0 as f32;
        if px_w == 0.0 || px_h == 0.0 {
            return Err(anyhow!("Cannot embed an empty image"));
        }
        let natural_w = px_w * 72.0 / IMAGE_DPI;
        let natural_h = px_h * 72.0 / IMAGE_DPI;

        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(mm(rect.x)),
                translate_y: Some(mm(self.page.height - rect.bottom())),
                scale_x: Some(rect.width / natural_w),
                scale_y: Some(rect.height / natural_h),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        Ok(())
    }

    /// Serializes the document. An image drawn on several pages is stored
    /// once and referenced by each of them; every stream is flate-compressed.
    pub fn finish(self) -> Result<Vec<u8>> {
        let raw = self
            .doc
            .save_to_bytes()
            .map_err(|e| anyhow!("Failed to assemble PDF: {:?}", e))?;

        let mut doc = lopdf::Document::load_mem(&raw)
            .map_err(|e| anyhow!("Failed to reopen PDF: {:?}", e))?;
        let shared = share_identical_images(&mut doc);
        debug!("{} duplicate image streams folded", shared);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| anyhow!("Failed to write PDF: {:?}", e))?;
        Ok(bytes)
    }
}

/// Points every reference to a byte-identical image stream at its first copy
/// and drops the rest. Returns how many copies were removed.
fn share_identical_images(doc: &mut lopdf::Document) -> usize {
    let mut first: HashMap<(String, &[u8]), ObjectId> = HashMap::new();
    let mut redirects: HashMap<ObjectId, ObjectId> = HashMap::new();
    for (&id, object) in &doc.objects {
        let Object::Stream(stream) = object else {
            continue;
        };
        if stream.dict.get(b"Subtype").and_then(Object::as_name_str).ok() != Some("Image") {
            continue;
        }
        let key = (format!("{:?}", stream.dict), stream.content.as_slice());
        match first.entry(key) {
            Entry::Occupied(original) => {
                redirects.insert(id, *original.get());
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
    }
    drop(first);

    for object in doc.objects.values_mut() {
        redirect(object, &redirects);
    }
    for id in redirects.keys() {
        doc.objects.remove(id);
    }
    redirects.len()
}

fn redirect(object: &mut Object, redirects: &HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(target) = redirects.get(id) {
                *id = *target;
            }
        }
        Object::Array(items) => items.iter_mut().for_each(|o| redirect(o, redirects)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, o)| redirect(o, redirects)),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .for_each(|(_, o)| redirect(o, redirects)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::compose::background::{encode_png, generate_background, Palette};

    #[test]
    fn test_points_convert_to_mm() {
        assert!((mm(72.0).0 - 25.4).abs() < 1e-4);
        assert!((mm(595.0).0 - 209.9).abs() < 0.1);
    }

    #[test]
    fn test_writer_produces_multi_page_pdf() -> Result<()> {
        let mut writer = PdfWriter::new("Test", "A comic about tests", PageGeometry::A4)?;
        writer.fill_rect(PageGeometry::A4.bounds(), [0, 0, 0]);
        writer.text(
            &TextLine::centered("Hello", 297.5, 400.0, 24.0, true),
            [255, 255, 255],
        );
        writer.add_page();
        writer.circle(100.0, 100.0, 20.0, [255, 0, 0], Some(([0, 0, 0], 1.0)));

        let png = encode_png(&generate_background(
            16,
            16,
            Palette {
                base: [1, 2, 3],
                dot: [9, 9, 9],
            },
            4,
            1,
        ))?;
        writer.image(&png, Rect::new(40.0, 40.0, 100.0, 100.0))?;

        assert_eq!(writer.page_count(), 2);
        let bytes = writer.finish()?;
        assert!(bytes.starts_with(b"%PDF"));
        Ok(())
    }

    #[test]
    fn test_image_rejects_garbage() -> Result<()> {
        let writer = PdfWriter::new("Test", "A comic about tests", PageGeometry::A4)?;
        assert!(writer.image(b"garbage", Rect::new(0.0, 0.0, 10.0, 10.0)).is_err());
        Ok(())
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn backdrop_png() -> Result<Vec<u8>> {
        encode_png(&generate_background(
            595,
            842,
            Palette {
                base: [240, 236, 228],
                dot: [200, 196, 188],
            },
            18,
            2,
        ))
    }

    fn document_with_backdrop(pages: usize, png: &[u8]) -> Result<Vec<u8>> {
        let mut writer = PdfWriter::new("Pages", "A comic about pages", PageGeometry::A4)?;
        writer.image(png, PageGeometry::A4.bounds())?;
        for _ in 1..pages {
            writer.add_page();
            writer.image(png, PageGeometry::A4.bounds())?;
        }
        writer.finish()
    }

    #[test]
    fn test_repeated_backdrop_is_stored_once() -> Result<()> {
        let png = backdrop_png()?;
        let one = document_with_backdrop(1, &png)?;
        let eleven = document_with_backdrop(11, &png)?;

        let raw_backdrop = 595 * 842 * 3;
        let per_page = (eleven.len() - one.len()) / 10;
        assert!(
            per_page < raw_backdrop / 50,
            "each extra page added {} bytes",
            per_page
        );
        let reopened =
            lopdf::Document::load_mem(&eleven).map_err(|e| anyhow!("{:?}", e))?;
        assert_eq!(reopened.get_pages().len(), 11);
        Ok(())
    }

    #[test]
    fn test_document_metadata() -> Result<()> {
        let writer = PdfWriter::new("Nova Takes Flight", "A comic about Nova", PageGeometry::A4)?;
        let bytes = writer.finish()?;
        assert!(contains(&bytes, b"Nova Takes Flight"));
        assert!(contains(&bytes, b"Comic Crafter AI"));
        assert!(contains(&bytes, b"A comic about Nova"));
        Ok(())
    }
}
