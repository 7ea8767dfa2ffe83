use super::types::Snippet;

/// Position within the relevant pages of one cited document.
///
/// The index is always kept inside `relevant_pages`; stepping past either end
/// saturates. An empty page list yields no visible page and every navigation
/// becomes a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNavigator {
    relevant_pages: Vec<u32>,
    snippets: Vec<Snippet>,
    index: usize,
}

impl PageNavigator {
    pub fn new(relevant_pages: Vec<u32>, initial_page: u32, snippets: Vec<Snippet>) -> Self {
        let index = initial_index(&relevant_pages, initial_page);
        Self {
            relevant_pages,
            snippets,
            index,
        }
    }

    /// Replaces the page list and recomputes the position from `initial_page`
    /// alone, whatever was shown before.
    pub fn reinitialize(
        &mut self,
        relevant_pages: Vec<u32>,
        initial_page: u32,
        snippets: Vec<Snippet>,
    ) {
        self.index = initial_index(&relevant_pages, initial_page);
        self.relevant_pages = relevant_pages;
        self.snippets = snippets;
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn relevant_pages(&self) -> &[u32] {
        &self.relevant_pages
    }

    pub fn visible_page(&self) -> Option<u32> {
        self.relevant_pages.get(self.index).copied()
    }

    pub fn can_go_previous(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.index + 1 < self.relevant_pages.len()
    }

    pub fn go_to_previous(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn go_to_next(&mut self) {
        if self.can_go_next() {
            self.index += 1;
        }
    }

    /// Snippet texts tagged with the visible page, in their original order.
    pub fn visible_snippets(&self) -> Vec<&str> {
        let Some(page) = self.visible_page() else {
            return Vec::new();
        };
        self.snippets
            .iter()
            .filter(|snippet| snippet.pages.contains(&page))
            .map(|snippet| snippet.text.as_str())
            .collect()
    }
}

fn initial_index(relevant_pages: &[u32], initial_page: u32) -> usize {
    relevant_pages
        .iter()
        .position(|page| *page == initial_page)
        .unwrap_or(0)
}
