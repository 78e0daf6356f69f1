//! Visual stamping of signed documents.
//!
//! The engine takes a PDF, a signature identifier and a list of placements,
//! and returns a new PDF with marks drawn on top of the addressed pages.
//! Pages without placements keep their original objects, and a placement
//! that cannot be drawn is skipped and reported without failing the rest.

mod overlay;
mod page;
mod placement;

pub use overlay::StampStyle;
pub use page::{page_box, PageBox};
pub use placement::{
    resolve_suggestions, NormalizedBox, NormalizedSuggestion, PlacementInstruction, PlacementKind,
    SuggestedPlacement,
};

use crate::audit::{AuditEvent, AuditSink, NoopAuditSink};
use crate::error::{Result, SignError};
use lopdf::{dictionary, Document, ObjectId};
use overlay::{add_image_xobject, decode_user_image, OverlayBuilder};
use page::{composite, merged_resources, OverlayResources};
use placement::group_by_page;
use std::sync::Arc;
use thiserror::Error;

/// Why a placement was not drawn.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("page {page} is outside the document ({page_count} pages)")]
    PageOutOfRange { page: u32, page_count: usize },

    #[error("no user image was supplied")]
    MissingImage,

    #[error("user image could not be decoded: {0}")]
    ImageDecode(String),
}

/// A placement that was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPlacement {
    /// Position in the input placement list.
    pub index: usize,
    pub page: u32,
    pub reason: SkipReason,
}

/// The stamped document and what happened to each placement.
#[derive(Debug, Clone)]
pub struct StampReport {
    pub document: Vec<u8>,
    /// Number of placements drawn.
    pub applied: usize,
    pub skipped: Vec<SkippedPlacement>,
}

/// Draws signature marks onto PDF pages.
#[derive(Clone)]
pub struct StampingEngine {
    style: StampStyle,
    audit: Arc<dyn AuditSink>,
}

impl Default for StampingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StampingEngine {
    pub fn new() -> Self {
        Self {
            style: StampStyle::default(),
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Use a different drawing style.
    pub fn with_style(mut self, style: StampStyle) -> Self {
        self.style = style;
        self
    }

    /// Send audit events to the given sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn style(&self) -> &StampStyle {
        &self.style
    }

    /// Stamp `document` with marks for `identifier`.
    ///
    /// `user_image` is base64 image data, optionally as a data URI; it is
    /// only needed for [`PlacementKind::UserImage`] placements. A document
    /// that cannot be parsed fails the whole call. Individual placements
    /// that cannot be drawn are listed in [`StampReport::skipped`].
    pub fn stamp(
        &self,
        document: &[u8],
        identifier: &str,
        placements: &[PlacementInstruction],
        user_image: Option<&str>,
    ) -> Result<StampReport> {
        match self.stamp_inner(document, identifier, placements, user_image) {
            Ok(report) => {
                self.audit.record(
                    AuditEvent::Stamp,
                    &format!(
                        "Stamped PDF with {} on {} locations ({} skipped)",
                        identifier,
                        report.applied,
                        report.skipped.len()
                    ),
                );
                Ok(report)
            }
            Err(e) => {
                self.audit.record(AuditEvent::StampError, &e.to_string());
                Err(e)
            }
        }
    }

    fn stamp_inner(
        &self,
        document: &[u8],
        identifier: &str,
        placements: &[PlacementInstruction],
        user_image: Option<&str>,
    ) -> Result<StampReport> {
        let mut doc = load(document)?;
        let pages = doc.get_pages();

        let mut skipped = Vec::new();
        for (index, placement) in placements.iter().enumerate() {
            if !pages.contains_key(&placement.page) {
                tracing::warn!(
                    page = placement.page,
                    page_count = pages.len(),
                    "Skipping placement outside the document"
                );
                skipped.push(SkippedPlacement {
                    index,
                    page: placement.page,
                    reason: SkipReason::PageOutOfRange {
                        page: placement.page,
                        page_count: pages.len(),
                    },
                });
            }
        }

        let grouped = group_by_page(placements);
        let mut font: Option<ObjectId> = None;
        let mut image: Option<std::result::Result<(ObjectId, f64), SkipReason>> = None;
        let mut applied = 0;

        for (page_number, page_id) in &pages {
            let Some(items) = grouped.get(page_number) else {
                continue;
            };
            let page_box = page_box(&doc, *page_id)?;
            tracing::debug!(
                page = page_number,
                width = page_box.width(),
                height = page_box.height(),
                "Stamping page"
            );

            // Resolve everything this page needs before naming resources.
            let mut resources = OverlayResources::default();
            let mut drawable = Vec::with_capacity(items.len());
            for (index, placement) in items {
                match placement.kind {
                    PlacementKind::Digital => {
                        let font_id = *font.get_or_insert_with(|| add_font(&mut doc));
                        resources.set_font(font_id);
                        drawable.push((placement, None));
                    }
                    PlacementKind::UserImage => {
                        let resolved = match user_image {
                            None => Err(SkipReason::MissingImage),
                            Some(data) => image
                                .get_or_insert_with(|| embed_user_image(&mut doc, data))
                                .clone(),
                        };
                        match resolved {
                            Ok((image_id, aspect)) => {
                                let slot = resources.add_image(image_id);
                                drawable.push((placement, Some((slot, aspect))));
                            }
                            Err(reason) => {
                                tracing::warn!(page = page_number, "Skipping user image: {}", reason);
                                skipped.push(SkippedPlacement {
                                    index: *index,
                                    page: *page_number,
                                    reason,
                                });
                            }
                        }
                    }
                }
            }
            if drawable.is_empty() {
                continue;
            }

            let (merged, names) = merged_resources(&doc, *page_id, &resources);
            let mut overlay = OverlayBuilder::new();
            for (placement, image_slot) in drawable {
                tracing::debug!(
                    page = page_number,
                    x = placement.x,
                    y = placement.y,
                    kind = ?placement.kind,
                    "Drawing placement"
                );
                match image_slot {
                    None => {
                        let font_name = names.font.as_deref().unwrap_or(&b"StampFont"[..]);
                        overlay.digital_mark(placement.x, placement.y, identifier, font_name, &self.style);
                    }
                    Some((slot, aspect)) => {
                        let width = self.style.image_width;
                        overlay.image(
                            placement.x,
                            placement.y,
                            width,
                            width * aspect,
                            &names.images[slot],
                        );
                    }
                }
                applied += 1;
            }
            composite(&mut doc, *page_id, merged, overlay.encode()?)?;
        }

        skipped.sort_by_key(|s| s.index);

        let document = if applied == 0 {
            // nothing was drawn, the input is already the answer
            document.to_vec()
        } else {
            let mut out = Vec::new();
            doc.save_to(&mut out)?;
            out
        };
        tracing::info!(identifier, applied, skipped = skipped.len(), "Stamped document");

        Ok(StampReport {
            document,
            applied,
            skipped,
        })
    }

    /// Native `(width, height)` of every page, page 1 first.
    pub fn page_sizes(&self, document: &[u8]) -> Result<Vec<(f64, f64)>> {
        let doc = load(document)?;
        doc.get_pages()
            .values()
            .map(|id| page_box(&doc, *id).map(|b| (b.width(), b.height())))
            .collect()
    }

    /// Map normalized suggestion boxes onto the document's actual pages.
    pub fn resolve_suggestions(
        &self,
        document: &[u8],
        suggestions: &[NormalizedSuggestion],
    ) -> Result<Vec<SuggestedPlacement>> {
        Ok(resolve_suggestions(&self.page_sizes(document)?, suggestions))
    }
}

fn load(document: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(document)
        .map_err(|e| SignError::UnparsableDocument(e.to_string()))?;
    if doc.get_pages().is_empty() {
        return Err(SignError::UnparsableDocument("document has no pages".to_string()));
    }
    Ok(doc)
}

fn add_font(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

fn embed_user_image(doc: &mut Document, data: &str) -> std::result::Result<(ObjectId, f64), SkipReason> {
    let image = decode_user_image(data).map_err(SkipReason::ImageDecode)?;
    let id = add_image_xobject(doc, &image).map_err(|e| SkipReason::ImageDecode(e.to_string()))?;
    Ok((id, image.aspect()))
}
