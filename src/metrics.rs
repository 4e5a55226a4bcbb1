#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    pub fragment_count: usize,
    pub command_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ComposeMetrics {
    pub pages: Vec<PageMetrics>,
    pub placed_fragments: usize,
    pub skipped_fragments: usize,
    pub total_ms: f64,
}
