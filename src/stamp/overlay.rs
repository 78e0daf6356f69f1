//! Drawing operations for the overlay and raster image embedding.

use crate::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// How marks are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct StampStyle {
    /// Digital mark box size.
    pub box_width: f64,
    pub box_height: f64,
    /// Text inset from the box's bottom-left corner.
    pub text_offset: f64,
    pub font_size: f64,
    /// Stroke and fill colour, RGB in 0..=1.
    pub color: [f64; 3],
    /// Text drawn before the identifier.
    pub label_prefix: String,
    /// Width user images are scaled to; height follows the aspect ratio.
    pub image_width: f64,
}

impl Default for StampStyle {
    fn default() -> Self {
        Self {
            box_width: 150.0,
            box_height: 30.0,
            text_offset: 10.0,
            font_size: 12.0,
            color: [0.0, 0.5, 0.0],
            label_prefix: "Signed: ".to_string(),
            image_width: 150.0,
        }
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as _)
}

fn name(value: &[u8]) -> Object {
    Object::Name(value.to_vec())
}

/// Accumulates overlay operations for one page.
#[derive(Debug, Default)]
pub(crate) struct OverlayBuilder {
    operations: Vec<Operation>,
}

impl OverlayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bordered box with `<prefix><identifier>` inside.
    pub fn digital_mark(&mut self, x: f64, y: f64, identifier: &str, font: &[u8], style: &StampStyle) {
        let [r, g, b] = style.color;
        let text = format!("{}{}", style.label_prefix, identifier);
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("RG", vec![real(r), real(g), real(b)]),
            Operation::new("rg", vec![real(r), real(g), real(b)]),
            Operation::new(
                "re",
                vec![real(x), real(y), real(style.box_width), real(style.box_height)],
            ),
            Operation::new("S", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![name(font), real(style.font_size)]),
            Operation::new(
                "Td",
                vec![real(x + style.text_offset), real(y + style.text_offset)],
            ),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Paint an image XObject with its bottom-left corner at (`x`, `y`).
    pub fn image(&mut self, x: f64, y: f64, width: f64, height: f64, xobject: &[u8]) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![real(width), real(0.0), real(0.0), real(height), real(x), real(y)],
            ),
            Operation::new("Do", vec![name(xobject)]),
            Operation::new("Q", vec![]),
        ]);
    }

    pub fn encode(self) -> Result<Vec<u8>> {
        Ok(Content {
            operations: self.operations,
        }
        .encode()?)
    }
}

/// A decoded user image, split into colour and alpha planes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RasterImage {
    pub width: u32,
    pub height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl RasterImage {
    /// Height over width.
    pub fn aspect(&self) -> f64 {
        f64::from(self.height) / f64::from(self.width)
    }
}

/// Decode a base64 image, optionally wrapped in a data URI.
pub(crate) fn decode_user_image(data: &str) -> std::result::Result<RasterImage, String> {
    let encoded = match data.split_once("base64,") {
        Some((_, payload)) => payload,
        None => data,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| format!("invalid base64: {}", e))?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| format!("invalid image: {}", e))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err("image has no pixels".to_string());
    }

    let pixels = rgba.into_raw();
    let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
    let mut alpha = Vec::with_capacity(pixels.len() / 4);
    for px in pixels.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
        alpha.push(px[3]);
    }
    let alpha = if alpha.iter().all(|a| *a == u8::MAX) {
        None
    } else {
        Some(alpha)
    };

    Ok(RasterImage {
        width,
        height,
        rgb,
        alpha,
    })
}

/// Add the image to the document as a Flate-compressed XObject, with a
/// soft mask when it has transparency.
pub(crate) fn add_image_xobject(doc: &mut Document, image: &RasterImage) -> Result<ObjectId> {
    let width = i64::from(image.width);
    let height = i64::from(image.height);

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if let Some(alpha) = &image.alpha {
        let mut mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha.clone(),
        );
        mask.compress()?;
        let mask_id = doc.add_object(mask);
        dict.set("SMask", Object::Reference(mask_id));
    }

    let mut stream = Stream::new(dict, image.rgb.clone());
    stream.compress()?;
    Ok(doc.add_object(stream))
}
