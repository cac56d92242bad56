//! onramp-render: plan text cleanup and page layout for export

pub mod normalize;
pub mod document;
pub mod pdf_prep;

pub use normalize::{normalize_markdown, passes, Pass, Rule};
pub use document::{
    link_placeholder, normalize_url, render, BlockKind, Document, LayoutConfig, Line, LineHeights,
    LinkRegion, Page, Span,
};
pub use pdf_prep::{
    export_plan, parse_hubs_from_plan, parse_objectives_from_plan, preprocess_plan_for_pdf,
    Closing, Cover, ExportedPlan, Footer, DEFAULT_COMPANY,
};
