// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Entry;

/// Iterator over the entries of a table, in slot order
#[derive(Clone, Debug)]
pub struct Iter<'t> {
    buffer: &'t [u8],
    entries: std::slice::Iter<'t, Entry>,
}

impl<'t> Iter<'t> {
    pub(super) fn new(buffer: &'t [u8], entries: &'t [Entry]) -> Self {
        Self {
            buffer,
            entries: entries.iter(),
        }
    }

    fn resolve(&self, entry: &Entry) -> (&'t [u8], &'t [u8]) {
        (entry.key.slice(self.buffer), entry.value.slice(self.buffer))
    }
}

impl<'t> Iterator for Iter<'t> {
    type Item = (&'t [u8], &'t [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(self.resolve(entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next_back()?;
        Some(self.resolve(entry))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl std::iter::FusedIterator for Iter<'_> {}

/// Iterator over the keys of a table, in slot order
#[derive(Clone, Debug)]
pub struct Keys<'t>(pub(super) Iter<'t>);

impl<'t> Iterator for Keys<'t> {
    type Item = &'t [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for Keys<'_> {}

/// Iterator over the values of a table, in slot order
#[derive(Clone, Debug)]
pub struct Values<'t>(pub(super) Iter<'t>);

impl<'t> Iterator for Values<'t> {
    type Item = &'t [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for Values<'_> {}
