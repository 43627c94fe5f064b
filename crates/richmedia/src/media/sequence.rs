//! Homogeneous, ordered collections of one media kind.

use super::{Descriptor, Media};
use crate::artifact::Artifact;
use crate::result::MediaResult;
use crate::run::Run;
use crate::video::Video;
use serde_json::Value;

/// Media kinds that can be grouped into a `MediaSequence`
pub trait SequenceItem: Media {
    /// Class tag of the sequence
    const SEQUENCE_CLASS: &'static str;
    /// `_type` of the sequence in both descriptor shapes
    const SEQUENCE_TYPE: &'static str;
    /// Key holding the element descriptors
    const ITEMS_KEY: &'static str;
}

/// Ordered sequence of videos
pub type VideoSequence = MediaSequence<Video>;

/// Ordered sequence of media objects of one kind
#[derive(Debug)]
pub struct MediaSequence<T> {
    items: Vec<T>,
}

impl<T: SequenceItem> MediaSequence<T> {
    /// Wrap `items`, keeping their order
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Elements in order
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the sequence has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an element
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Unwrap the elements
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    fn descriptor(descriptors: Vec<Descriptor>) -> Descriptor {
        let mut out = Descriptor::new();
        out.insert("_type".into(), T::SEQUENCE_TYPE.into());
        out.insert("count".into(), descriptors.len().into());
        out.insert(
            T::ITEMS_KEY.into(),
            Value::Array(descriptors.into_iter().map(Value::Object).collect()),
        );
        out
    }
}

impl<T: SequenceItem> FromIterator<T> for MediaSequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: SequenceItem> Media for MediaSequence<T> {
    fn class_name(&self) -> &'static str {
        T::SEQUENCE_CLASS
    }

    /// Binds every element in order; an explicit name gets an `_<index>`
    /// suffix per element.
    fn bind_to_run(
        &mut self,
        run: &mut dyn Run,
        namespace: &[&str],
        name: Option<&str>,
    ) -> MediaResult<()> {
        for (index, item) in self.items.iter_mut().enumerate() {
            let item_name = name.map(|n| format!("{n}_{index}"));
            item.bind_to_run(run, namespace, item_name.as_deref())?;
        }
        Ok(())
    }

    fn bind_to_artifact(&mut self, artifact: &mut dyn Artifact) -> MediaResult<Descriptor> {
        let descriptors = self
            .items
            .iter_mut()
            .map(|item| item.bind_to_artifact(artifact))
            .collect::<MediaResult<Vec<_>>>()?;
        Ok(Self::descriptor(descriptors))
    }

    fn to_json(&self) -> MediaResult<Descriptor> {
        let descriptors = self
            .items
            .iter()
            .map(|item| item.to_json())
            .collect::<MediaResult<Vec<_>>>()?;
        Ok(Self::descriptor(descriptors))
    }
}
