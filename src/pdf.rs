use crate::canvas::{Command, Document, ImageResource};
use crate::content::ImageEncoding;
use crate::error::PagePressError;
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream, dictionary};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone)]
pub(crate) struct PdfOptions {
    pub compress: bool,
    /// Quality for bitmaps transcoded to JPEG at write time, 1..=100.
    pub jpeg_quality: u8,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            compress: true,
            jpeg_quality: 100,
        }
    }
}

fn lopdf_err(err: lopdf::Error) -> PagePressError {
    PagePressError::Pdf(err.to_string())
}

/// Serializes a composed document to PDF bytes. Image resources become
/// XObjects shared across pages; page content streams only reference them.
pub(crate) fn write_document(
    document: &Document,
    options: &PdfOptions,
) -> Result<Vec<u8>, PagePressError> {
    let mut doc = LoDocument::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut xobject_ids = Vec::with_capacity(document.images.len());
    for resource in &document.images {
        xobject_ids.push(embed_image(&mut doc, resource, options)?);
    }

    let page_width_pt = document.page_size.width.to_pt();
    let page_height_pt = document.page_size.height.to_pt();

    let mut kids = Vec::new();
    for page in &document.pages {
        let content = page_content(document, &page.commands, page_height_pt);
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content.into_bytes()));

        let mut xobjects = lopdf::Dictionary::new();
        for (index, object_id) in xobject_ids.iter().enumerate() {
            xobjects.set(format!("Im{index}").into_bytes(), LoObject::Reference(*object_id));
        }
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => LoObject::Reference(pages_id),
            "MediaBox" => vec![
                0.into(),
                0.into(),
                page_width_pt.into(),
                page_height_pt.into(),
            ],
            "Contents" => LoObject::Reference(content_id),
            "Resources" => LoObject::Dictionary(dictionary! {
                "XObject" => LoObject::Dictionary(xobjects),
            }),
        });
        kids.push(LoObject::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => LoObject::Reference(pages_id),
    });
    doc.trailer.set("Root", catalog_id);

    if options.compress {
        doc.compress();
    }

    let mut out = Vec::new();
    doc.save_to(&mut std::io::Cursor::new(&mut out))?;
    Ok(out)
}

pub(crate) fn save_document(
    document: &Document,
    options: &PdfOptions,
    path: &Path,
) -> Result<(), PagePressError> {
    let bytes = write_document(document, options)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// One image XObject per resource. JPEG bytes pass through as DCTDecode;
/// everything else is decoded, flate-compressed as raw RGB with an SMask
/// for any alpha channel, or transcoded to JPEG when that encoding was
/// requested for the resource.
fn embed_image(
    doc: &mut LoDocument,
    resource: &ImageResource,
    options: &PdfOptions,
) -> Result<LoObjectId, PagePressError> {
    let bitmap = &resource.bitmap;
    let sniffed = image::guess_format(&bitmap.data).ok();

    if matches!(sniffed, Some(image::ImageFormat::Jpeg)) {
        let decoded = image::load_from_memory(&bitmap.data)
            .map_err(|err| PagePressError::Pdf(format!("jpeg resource: {err}")))?;
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "DeviceGray",
            _ => "DeviceRGB",
        };
        let stream = LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => bitmap.width_px as i64,
                "Height" => bitmap.height_px as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bitmap.data.clone(),
        );
        return Ok(doc.add_object(stream));
    }

    let decoded = image::load_from_memory(&bitmap.data)
        .map_err(|err| PagePressError::Pdf(format!("image resource: {err}")))?;

    if resource.encoding == ImageEncoding::Jpeg {
        let rgb = decoded.to_rgb8();
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, options.jpeg_quality)
            .encode_image(&rgb)
            .map_err(|err| PagePressError::Pdf(format!("jpeg transcode: {err}")))?;
        let stream = LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => bitmap.width_px as i64,
                "Height" => bitmap.height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        return Ok(doc.add_object(stream));
    }

    let rgba = decoded.to_rgba8();
    let pixel_count = (bitmap.width_px as usize) * (bitmap.height_px as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let smask_id = if has_alpha {
        let stream = LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => bitmap.width_px as i64,
                "Height" => bitmap.height_px as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            flate_compress(&alpha),
        );
        Some(doc.add_object(stream))
    } else {
        None
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => bitmap.width_px as i64,
        "Height" => bitmap.height_px as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if let Some(id) = smask_id {
        dict.set("SMask", LoObject::Reference(id));
    }
    Ok(doc.add_object(LoStream::new(dict, flate_compress(&rgb))))
}

/// Content stream for one page. A partial source band draws the full
/// image translated so the band falls inside a clip rect on the target
/// position; a full band draws the image directly.
fn page_content(document: &Document, commands: &[Command], page_height_pt: f32) -> String {
    let mut out = String::new();
    for command in commands {
        let Command::DrawImage {
            image,
            x,
            y,
            width,
            height,
            src_y_px,
            src_height_px,
        } = command;
        let resource = &document.images[*image];
        if *src_height_px == 0 || resource.bitmap.height_px == 0 {
            continue;
        }

        let x_pt = x.to_pt();
        let slice_height_pt = height.to_pt();
        let width_pt = width.to_pt();
        let slice_bottom_pt = page_height_pt - y.to_pt() - slice_height_pt;
        let full_band = *src_height_px == resource.bitmap.height_px && *src_y_px == 0;

        if full_band {
            let _ = writeln!(
                out,
                "q {width_pt:.2} 0 0 {slice_height_pt:.2} {x_pt:.2} {slice_bottom_pt:.2} cm /Im{image} Do Q"
            );
        } else {
            let total_px = resource.bitmap.height_px as f32;
            let full_height_pt = slice_height_pt * total_px / *src_height_px as f32;
            let top_offset_pt = (*src_y_px as f32 / total_px) * full_height_pt;
            // Bottom edge of the full image once the band aligns with the
            // slice rect.
            let image_bottom_pt = page_height_pt - (y.to_pt() - top_offset_pt) - full_height_pt;
            let _ = writeln!(
                out,
                "q {x_pt:.2} {slice_bottom_pt:.2} {width_pt:.2} {slice_height_pt:.2} re W n \
                 {width_pt:.2} 0 0 {full_height_pt:.2} {x_pt:.2} {image_bottom_pt:.2} cm /Im{image} Do Q"
            );
        }
    }
    out
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}
