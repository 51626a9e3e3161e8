//! Feature alignment
//!
//! Callers supply feature values by name, possibly a subset and in any order.
//! An [`AlignmentTable`] resolves every binding to its trained slot once, so
//! that each request is only a walk over the slots.

use crate::index_map::IndexMap;
use crate::schema::FeatureSchema;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pulls one raw value out of a request context.
///
/// `None` means the value is absent; the predictor then treats the slot as
/// missing. Any `Fn(&C) -> Option<String>` closure is an extractor.
pub trait ValueExtractor<C: ?Sized>: Send + Sync {
    fn extract(&self, ctx: &C) -> Option<String>;
}

impl<C: ?Sized, F> ValueExtractor<C> for F
where
    F: Fn(&C) -> Option<String> + Send + Sync,
{
    fn extract(&self, ctx: &C) -> Option<String> {
        self(ctx)
    }
}

/// A feature name paired with the extractor that produces its value
pub struct Binding<C: ?Sized> {
    pub feature: String,
    pub extractor: Arc<dyn ValueExtractor<C>>,
}

impl<C: ?Sized> Clone for Binding<C> {
    fn clone(&self) -> Self {
        Self {
            feature: self.feature.clone(),
            extractor: Arc::clone(&self.extractor),
        }
    }
}

impl<C: ?Sized> fmt::Debug for Binding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("feature", &self.feature)
            .finish_non_exhaustive()
    }
}

/// Ordered feature-name bindings, built once per serving configuration
pub struct BindingSet<C: ?Sized> {
    bindings: Vec<Binding<C>>,
}

impl<C: ?Sized> Default for BindingSet<C> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }
}

impl<C: ?Sized> Clone for BindingSet<C> {
    fn clone(&self) -> Self {
        Self {
            bindings: self.bindings.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for BindingSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|b| &b.feature))
            .finish()
    }
}

impl<C: ?Sized> BindingSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding. A later binding for the same name replaces the earlier one.
    pub fn insert<E>(&mut self, feature: impl Into<String>, extractor: E)
    where
        E: ValueExtractor<C> + 'static,
    {
        self.insert_shared(feature, Arc::new(extractor));
    }

    pub fn insert_shared(&mut self, feature: impl Into<String>, extractor: Arc<dyn ValueExtractor<C>>) {
        let feature = feature.into();
        match self.bindings.iter_mut().find(|b| b.feature == feature) {
            Some(existing) => existing.extractor = extractor,
            None => self.bindings.push(Binding { feature, extractor }),
        }
    }

    /// Builder form of [`BindingSet::insert`]
    pub fn bind<E>(mut self, feature: impl Into<String>, extractor: E) -> Self
    where
        E: ValueExtractor<C> + 'static,
    {
        self.insert(feature, extractor);
        self
    }

    pub fn get(&self, feature: &str) -> Option<&Binding<C>> {
        self.bindings.iter().find(|b| b.feature == feature)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.feature.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One optional raw value per trained slot, rebuilt for every request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlignedVector(Vec<Option<String>>);

impl AlignedVector {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self(values)
    }

    /// Positional row where every slot is present
    pub fn from_values<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self(values.into_iter().map(|v| Some(v.into())).collect())
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, slot: usize) -> Option<&str> {
        self.0.get(slot).and_then(|v| v.as_deref())
    }

    pub fn as_slice(&self) -> &[Option<String>] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Option<String>> {
        self.0
    }
}

impl From<Vec<Option<String>>> for AlignedVector {
    fn from(values: Vec<Option<String>>) -> Self {
        Self(values)
    }
}

/// Slot-indexed bindings for one (schema, index map) pair.
///
/// Slot `i` holds the binding of the feature whose original index is
/// `new_to_old[i]`, or `None` when the caller did not bind that feature.
pub struct AlignmentTable<C: ?Sized> {
    slots: Vec<Option<Binding<C>>>,
}

impl<C: ?Sized> Clone for AlignmentTable<C> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for AlignmentTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignmentTable")
            .field("layout", &self.layout())
            .finish()
    }
}

impl<C: ?Sized> AlignmentTable<C> {
    /// Resolve `bindings` against the trained input space.
    ///
    /// Bindings for unknown names are ignored, as are bindings for schema
    /// features that were not trained on (discarded or response columns).
    /// Trained features without a binding leave their slot empty.
    pub fn bind(schema: &FeatureSchema, index_map: &IndexMap, bindings: &BindingSet<C>) -> Self {
        let mut slots: Vec<Option<Binding<C>>> = vec![None; index_map.width()];

        for binding in &bindings.bindings {
            let Some(feature) = schema.get(&binding.feature) else {
                warn!("Ignoring binding for unknown feature '{}'", binding.feature);
                continue;
            };
            match index_map.position_of(feature.index) {
                Some(slot) => slots[slot] = Some(binding.clone()),
                None => debug!(
                    "Feature '{}' is not a model input, binding skipped",
                    feature.name
                ),
            }
        }

        for slot in (0..slots.len()).filter(|&s| slots[s].is_none()) {
            let name = index_map
                .original_of(slot)
                .and_then(|original| schema.by_index(original))
                .map(|f| f.name.as_str())
                .unwrap_or("?");
            debug!("Slot {} ('{}') has no binding and will be imputed", slot, name);
        }

        Self { slots }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.slots.len()
    }

    /// Run every bound extractor against `ctx`
    pub fn fill(&self, ctx: &C) -> AlignedVector {
        AlignedVector(
            self.slots
                .iter()
                .map(|slot| slot.as_ref().and_then(|b| b.extractor.extract(ctx)))
                .collect(),
        )
    }

    /// Bound feature name per slot
    pub fn layout(&self) -> Vec<Option<&str>> {
        self.slots
            .iter()
            .map(|slot| slot.as_ref().map(|b| b.feature.as_str()))
            .collect()
    }

    pub fn unbound_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_none())
            .map(|(slot, _)| slot)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Feature;
    use std::collections::HashMap;

    type Request = HashMap<String, String>;

    fn field(name: &'static str) -> impl Fn(&Request) -> Option<String> + Send + Sync {
        move |req: &Request| req.get(name).cloned()
    }

    fn scenario() -> (FeatureSchema, IndexMap) {
        let schema = FeatureSchema::new(vec![
            Feature::numerical("age", 0),
            Feature::numerical("income", 1),
            Feature::categorical("zipcode", 2).excluded(),
            Feature::numerical("target", 3),
        ]);
        let map = IndexMap::from_schema(&schema, Some(3)).unwrap();
        (schema, map)
    }

    fn request(pairs: &[(&str, &str)]) -> Request {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_partial_bindings() {
        let (schema, map) = scenario();
        let bindings = BindingSet::<Request>::new()
            .bind("age", field("age"))
            .bind("zipcode", field("zipcode"));
        let table = AlignmentTable::bind(&schema, &map, &bindings);

        assert_eq!(table.width(), 2);
        assert_eq!(table.layout(), vec![Some("age"), None]);
        assert_eq!(table.unbound_slots(), vec![1]);

        let aligned = table.fill(&request(&[("age", "40"), ("zipcode", "90210")]));
        assert_eq!(aligned.as_slice(), &[Some("40".to_string()), None]);
    }

    #[test]
    fn test_binding_order_does_not_matter() {
        let (schema, map) = scenario();
        let forward = BindingSet::<Request>::new()
            .bind("age", field("age"))
            .bind("income", field("income"));
        let reverse = BindingSet::<Request>::new()
            .bind("income", field("income"))
            .bind("age", field("age"));
        let a = AlignmentTable::bind(&schema, &map, &forward);
        let b = AlignmentTable::bind(&schema, &map, &reverse);
        assert_eq!(a.layout(), b.layout());

        let req = request(&[("age", "31"), ("income", "5000")]);
        assert_eq!(a.fill(&req), b.fill(&req));
        assert_eq!(a.fill(&req).get(0), Some("31"));
    }

    #[test]
    fn test_unknown_and_response_bindings_ignored() {
        let (schema, map) = scenario();
        let bindings = BindingSet::<Request>::new()
            .bind("target", field("target"))
            .bind("height", field("height"))
            .bind("income", field("income"));
        let table = AlignmentTable::bind(&schema, &map, &bindings);
        assert_eq!(table.layout(), vec![None, Some("income")]);
    }

    #[test]
    fn test_rebinding_replaces_extractor() {
        let mut bindings: BindingSet<Request> = BindingSet::new();
        bindings.insert("age", |_: &Request| Some("1".to_string()));
        bindings.insert("age", |_: &Request| Some("2".to_string()));
        assert_eq!(bindings.len(), 1);

        let (schema, map) = scenario();
        let table = AlignmentTable::bind(&schema, &map, &bindings);
        assert_eq!(table.fill(&Request::new()).get(0), Some("2"));
    }

    #[test]
    fn test_absent_value_is_none() {
        let (schema, map) = scenario();
        let bindings = BindingSet::<Request>::new().bind("age", field("age"));
        let table = AlignmentTable::bind(&schema, &map, &bindings);
        assert_eq!(table.fill(&Request::new()).get(0), None);
    }
}
