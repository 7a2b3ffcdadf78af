//! Cursor-driven enumeration of the remote collection
//!
//! The [`Enumerator`] requests pages until the server runs dry, deduplicating records
//! by identity in first-seen order. A page is terminal when it is empty, when the
//! server sets `end_of_list`, or when no cursor for a next page is returned.
//!
//! Between pages an optional [`PageGate`] may suspend enumeration (for example to ask
//! an operator whether to continue). The wait holds no lock and is raced against the
//! cancellation token.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::client::EnumerationClient;
use crate::config::EnumerationConfig;
use crate::error::{Error, Result};
use crate::snapshot::EnumerationSnapshot;
use crate::types::{Cursor, Event, Page, PageRequest, Speech};

/// Decides whether enumeration continues after a page
#[async_trait]
pub trait PageGate: Send + Sync {
    /// Called after page `page` (1-based) with the unique record count so far.
    /// Returning false stops enumeration with what has been collected.
    async fn continue_after(&self, page: usize, total_unique: usize) -> bool;
}

/// Gate that never stops enumeration
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysContinue;

#[async_trait]
impl PageGate for AlwaysContinue {
    async fn continue_after(&self, _page: usize, _total_unique: usize) -> bool {
        true
    }
}

/// Drives pagination against an [`EnumerationClient`]
pub struct Enumerator<'a> {
    client: &'a dyn EnumerationClient,
    config: &'a EnumerationConfig,
    gate: &'a dyn PageGate,
    events: Option<broadcast::Sender<Event>>,
    cancel: CancellationToken,
}

impl<'a> Enumerator<'a> {
    /// Create an enumerator using `config` for page size, scope and page ceiling
    pub fn new(client: &'a dyn EnumerationClient, config: &'a EnumerationConfig) -> Self {
        Self {
            client,
            config,
            gate: &AlwaysContinue,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Consult `gate` between pages
    #[must_use]
    pub fn with_gate(mut self, gate: &'a dyn PageGate) -> Self {
        self.gate = gate;
        self
    }

    /// Emit [`Event::PageFetched`] and [`Event::EnumerationComplete`] on `events`
    #[must_use]
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Abort with [`Error::Interrupted`] when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enumerate every record
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if any page request fails (fatal, no page is retried)
    /// - [`Error::Protocol`] if a page carries a non-OK status or cannot be decoded
    /// - [`Error::Interrupted`] if cancelled mid-run
    pub async fn enumerate(&self) -> Result<EnumerationSnapshot> {
        let mut cursor: Option<Cursor> = None;
        let mut seen = HashSet::new();
        let mut speeches: Vec<Speech> = Vec::new();
        let mut pages = 0usize;

        loop {
            if let Some(max_pages) = self.config.max_pages
                && pages >= max_pages
            {
                tracing::warn!(
                    max_pages,
                    total_unique = speeches.len(),
                    "Page ceiling reached before end of list, stopping enumeration"
                );
                break;
            }

            let page = self.fetch(cursor.as_ref()).await?;
            pages += 1;

            if !page.is_ok() {
                return Err(Error::Protocol(format!(
                    "page {pages} returned status {:?}",
                    page.status.as_deref().unwrap_or("<missing>")
                )));
            }

            if page.speeches.is_empty() {
                tracing::debug!(page = pages, "Empty page, enumeration complete");
                break;
            }

            let mut new_records = 0;
            for raw in page.speeches {
                match Speech::try_from(raw) {
                    Ok(speech) => {
                        if seen.insert(speech.id().clone()) {
                            speeches.push(speech);
                            new_records += 1;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(page = pages, error = %e, "Skipping malformed record");
                    }
                }
            }

            tracing::debug!(
                page = pages,
                new_records,
                total_unique = speeches.len(),
                "Processed page"
            );
            self.emit(Event::PageFetched {
                page: pages,
                new_records,
                total_unique: speeches.len(),
            });

            if page.end_of_list {
                tracing::debug!(page = pages, "Server signalled end of list");
                break;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    tracing::debug!(page = pages, "No cursor for next page, treating as end");
                    break;
                }
            }

            let proceed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Interrupted),
                proceed = self.gate.continue_after(pages, speeches.len()) => proceed,
            };
            if !proceed {
                tracing::info!(page = pages, "Enumeration stopped between pages");
                break;
            }
        }

        tracing::info!(total = speeches.len(), pages, "Enumeration complete");
        self.emit(Event::EnumerationComplete {
            total: speeches.len(),
            pages,
        });
        Ok(EnumerationSnapshot::new(speeches))
    }

    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<Page> {
        let request = PageRequest {
            cursor,
            page_size: self.config.page_size,
            source: &self.config.source,
            folder: self.config.folder,
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Interrupted),
            page = self.client.fetch_page(&request) => page,
        }
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.send(event).ok();
        }
    }
}

/// What the first page of the listing looks like
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirstPageProbe {
    /// Records on the first page
    pub records: usize,
    /// Titles of up to the first three records
    pub sample_titles: Vec<String>,
    /// Whether the first page is also the last
    pub end_of_list: bool,
    /// Cursor for the second page
    pub next_cursor: Option<String>,
}

/// Fetch only the first page and summarize it
///
/// # Errors
///
/// Same as [`Enumerator::enumerate`] for a single page.
pub async fn probe_first_page(
    client: &dyn EnumerationClient,
    config: &EnumerationConfig,
) -> Result<FirstPageProbe> {
    let request = PageRequest {
        cursor: None,
        page_size: config.page_size,
        source: &config.source,
        folder: config.folder,
    };
    let page = client.fetch_page(&request).await?;
    if !page.is_ok() {
        return Err(Error::Protocol(format!(
            "first page returned status {:?}",
            page.status.as_deref().unwrap_or("<missing>")
        )));
    }

    let sample_titles = page
        .speeches
        .iter()
        .take(3)
        .map(|raw| raw.title.clone().unwrap_or_default())
        .collect();

    Ok(FirstPageProbe {
        records: page.speeches.len(),
        sample_titles,
        end_of_list: page.end_of_list,
        next_cursor: page.next_cursor.map(|c| c.as_str().to_string()),
    })
}
