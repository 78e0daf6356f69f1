//! Page tree helpers: inherited attributes, page boxes and compositing.

use crate::error::{Result, SignError};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Guards against reference cycles in malformed page trees.
const MAX_DEPTH: usize = 64;

/// A page's media box in native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    fn from_array(values: &[Object]) -> Option<Self> {
        if values.len() != 4 {
            return None;
        }
        let mut numbers = [0f64; 4];
        for (slot, value) in numbers.iter_mut().zip(values) {
            *slot = f64::from(value.as_float().ok()?);
        }
        let [x0, y0, x1, y1] = numbers;
        Some(Self {
            llx: x0.min(x1),
            lly: y0.min(y1),
            urx: x0.max(x1),
            ury: y0.max(y1),
        })
    }
}

/// Follow indirect references to the underlying object.
pub(crate) fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> Option<&'a Object> {
    for _ in 0..MAX_DEPTH {
        match object {
            Object::Reference(id) => object = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Look up a page attribute, walking up the page tree for inheritable keys.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The media box of a page.
pub fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    let values = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .ok_or_else(|| {
            SignError::UnparsableDocument(format!("page {:?} has no MediaBox", page_id))
        })?;
    let mut resolved = Vec::with_capacity(values.len());
    for value in values {
        resolved.push(resolve(doc, value).cloned().unwrap_or(Object::Null));
    }
    PageBox::from_array(&resolved).ok_or_else(|| {
        SignError::UnparsableDocument(format!("page {:?} has a malformed MediaBox", page_id))
    })
}

fn resolved_dictionary(doc: &Document, object: Option<&Object>) -> Dictionary {
    object
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new)
}

/// A resource name not yet used in `dict`.
fn unique_name(dict: &Dictionary, base: &str) -> Vec<u8> {
    if !dict.has(base.as_bytes()) {
        return base.as_bytes().to_vec();
    }
    (1..)
        .map(|n| format!("{}{}", base, n).into_bytes())
        .find(|name| !dict.has(name))
        .unwrap_or_else(|| base.as_bytes().to_vec())
}

/// Resources to attach to a page before its overlay can reference them.
#[derive(Debug, Default)]
pub(crate) struct OverlayResources {
    font: Option<ObjectId>,
    images: Vec<ObjectId>,
}

/// Names under which [`OverlayResources`] were registered on a page.
#[derive(Debug, Default)]
pub(crate) struct ResourceNames {
    pub font: Option<Vec<u8>>,
    pub images: Vec<Vec<u8>>,
}

impl OverlayResources {
    pub fn set_font(&mut self, font: ObjectId) {
        self.font = Some(font);
    }

    /// Register an image, returning its position for [`ResourceNames::images`].
    pub fn add_image(&mut self, image: ObjectId) -> usize {
        if let Some(pos) = self.images.iter().position(|id| *id == image) {
            return pos;
        }
        self.images.push(image);
        self.images.len() - 1
    }
}

/// Page's effective resources with the overlay's font and images merged
/// in. The page gets its own copy, so resources shared with other pages
/// through the page tree or indirect objects are left untouched.
pub(crate) fn merged_resources(
    doc: &Document,
    page_id: ObjectId,
    additions: &OverlayResources,
) -> (Dictionary, ResourceNames) {
    let mut resources = resolved_dictionary(doc, inherited(doc, page_id, b"Resources"));
    let mut names = ResourceNames::default();

    if let Some(font) = additions.font {
        let mut fonts = resolved_dictionary(doc, resources.get(b"Font").ok());
        let name = unique_name(&fonts, "StampFont");
        fonts.set(name.clone(), Object::Reference(font));
        resources.set("Font", Object::Dictionary(fonts));
        names.font = Some(name);
    }

    if !additions.images.is_empty() {
        let mut xobjects = resolved_dictionary(doc, resources.get(b"XObject").ok());
        for image in &additions.images {
            let name = unique_name(&xobjects, "StampImage");
            xobjects.set(name.clone(), Object::Reference(*image));
            names.images.push(name);
        }
        resources.set("XObject", Object::Dictionary(xobjects));
    }

    (resources, names)
}

/// The page's content streams as a flat list of references.
fn content_streams(doc: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Draw `overlay` on top of the page's existing content.
///
/// The original streams are wrapped in `q`/`Q` so whatever graphics state
/// they leave behind cannot leak into the overlay; the streams themselves
/// are not modified. The overlay stream is Flate-compressed.
pub(crate) fn composite(
    doc: &mut Document,
    page_id: ObjectId,
    resources: Dictionary,
    overlay: Vec<u8>,
) -> Result<()> {
    let existing = content_streams(doc, doc.get_dictionary(page_id)?);

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut overlay_content = b"\nQ\n".to_vec();
    overlay_content.extend_from_slice(&overlay);
    let mut overlay_stream = Stream::new(Dictionary::new(), overlay_content);
    overlay_stream.compress()?;
    let overlay_id = doc.add_object(overlay_stream);

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    let page = doc.get_dictionary_mut(page_id)?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}
