//! Filename stems derived from record names.

use std::collections::HashMap;

use sheetsync_shared::{Record, RecordKey};

/// Stem used when a name has no sluggable characters at all.
const EMPTY_SLUG: &str = "entry";

/// ASCII, lower-case, dash-separated form of `text`.
///
/// `"Ọ̀gbụ́ Ọhịa"` → `"ogbu-ohia"`. Every non-alphanumeric run, quotes
/// included, becomes one dash: `"Chi's"` → `"chi-s"`.
pub fn slugify(text: &str) -> String {
    deunicode::deunicode(text)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Hands out filename stems that are unique per key.
///
/// The first key to want a stem gets the plain name slug. A later, different
/// key with the same name slug gets `<name>-<section>`, then `<name>-<section>-2`,
/// `-3`, … until free.
#[derive(Debug, Default)]
pub struct SlugAllocator {
    claimed: HashMap<String, RecordKey>,
}

impl SlugAllocator {
    /// Replay the allocation over the records already in the store, in
    /// store order, so new rows cannot take a stem an existing record holds.
    pub fn seeded(records: &[Record]) -> Self {
        let mut allocator = Self::default();
        for record in records {
            allocator.claim(&record.key());
        }
        allocator
    }

    /// Stem for `key`, claiming it if new.
    pub fn claim(&mut self, key: &RecordKey) -> String {
        let mut base = slugify(&key.name);
        if base.is_empty() {
            base = EMPTY_SLUG.to_string();
        }

        if self.try_claim(&base, key) {
            return base;
        }

        let section = slugify(&key.section);
        let qualified = if section.is_empty() {
            base
        } else {
            format!("{base}-{section}")
        };
        if self.try_claim(&qualified, key) {
            return qualified;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{qualified}-{n}");
            if self.try_claim(&candidate, key) {
                return candidate;
            }
            n += 1;
        }
    }

    fn try_claim(&mut self, stem: &str, key: &RecordKey) -> bool {
        match self.claimed.get(stem) {
            Some(owner) => owner == key,
            None => {
                self.claimed.insert(stem.to_string(), key.clone());
                true
            }
        }
    }
}
