pub mod test_helpers {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::document::{Document, Page, PageIndex};
    use crate::farm::{PageRenderer, RenderFault, RenderedImage};

    pub const TEST_MIME: &str = "image/x-pagefarm-test";

    /// Document whose page `n` bitmap is filled with the byte `n`
    pub fn numbered_document(pages: usize, width: u32, height: u32) -> Arc<Document> {
        let len = width as usize * height as usize;
        Arc::new(Document::new(
            width,
            height,
            (1..=pages)
                .map(|n| Page::new(n, vec![n as u8; len]).with_text(format!("page {n}")))
                .collect(),
        ))
    }

    /// Builder-style renderer for exercising the pool without real rasterization.
    ///
    /// Produces images whose bytes are the page's bitmap, so results can be
    /// checked against `document.pages[n - 1]`.
    #[derive(Default)]
    pub struct ScriptedRenderer {
        fail_on: HashSet<PageIndex>,
        panic_on: HashSet<PageIndex>,
        delays: HashMap<PageIndex, Duration>,
        default_delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedRenderer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Return a render fault for `page`
        pub fn fail_on(mut self, page: PageIndex) -> Self {
            self.fail_on.insert(page);
            self
        }

        /// Panic while rendering `page`
        pub fn panic_on(mut self, page: PageIndex) -> Self {
            self.panic_on.insert(page);
            self
        }

        /// Sleep before rendering `page`
        pub fn delay(mut self, page: PageIndex, delay: Duration) -> Self {
            self.delays.insert(page, delay);
            self
        }

        /// Sleep before rendering any page without its own delay
        pub fn delay_all(mut self, delay: Duration) -> Self {
            self.default_delay = delay;
            self
        }

        /// Number of render calls made so far
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn into_shared(self) -> Arc<Self> {
            Arc::new(self)
        }
    }

    impl PageRenderer for ScriptedRenderer {
        fn render(&self, document: &Document, page: PageIndex) -> Result<RenderedImage, RenderFault> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let delay = self.delays.get(&page).copied().unwrap_or(self.default_delay);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            if self.panic_on.contains(&page) {
                panic!("scripted panic on page {page}");
            }
            if self.fail_on.contains(&page) {
                return Err(RenderFault::generic(format!("scripted failure on page {page}")));
            }

            let source = document
                .page(page)
                .ok_or(RenderFault::MissingPage { page })?;
            Ok(RenderedImage {
                page,
                mime: TEST_MIME.to_string(),
                width: document.width,
                height: document.height,
                bytes: source.bitmap.clone(),
            })
        }
    }
}
