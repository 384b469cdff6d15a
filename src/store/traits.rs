//! Config store trait and dynamic dispatch companion.

use crate::error::StoreError;
use crate::store::{SaveResponse, SectionPayload, SectionUpdates};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`ConfigStoreDyn`].
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Static trait for configuration store backends.
/// Use this for type-safe implementations.
pub trait ConfigStore: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Names of every section the backend exposes.
    fn list_sections(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Current schema and values for a section.
    fn fetch_section(
        &self,
        section: &str,
    ) -> impl Future<Output = Result<SectionPayload, StoreError>> + Send;

    /// Apply only the given keys. Locked keys are expected to be ignored.
    fn save_section(
        &self,
        section: &str,
        updates: SectionUpdates,
    ) -> impl Future<Output = Result<SaveResponse, StoreError>> + Send;
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn ConfigStoreDyn>` to hold any backend.
pub trait ConfigStoreDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn list_sections<'a>(&'a self) -> StoreFuture<'a, Vec<String>>;

    fn fetch_section<'a>(&'a self, section: &'a str) -> StoreFuture<'a, SectionPayload>;

    fn save_section<'a>(
        &'a self,
        section: &'a str,
        updates: SectionUpdates,
    ) -> StoreFuture<'a, SaveResponse>;
}

/// Blanket implementation: any type implementing ConfigStore automatically implements ConfigStoreDyn.
impl<T: ConfigStore> ConfigStoreDyn for T {
    fn name(&self) -> &str {
        ConfigStore::name(self)
    }

    fn list_sections<'a>(&'a self) -> StoreFuture<'a, Vec<String>> {
        Box::pin(ConfigStore::list_sections(self))
    }

    fn fetch_section<'a>(&'a self, section: &'a str) -> StoreFuture<'a, SectionPayload> {
        Box::pin(ConfigStore::fetch_section(self, section))
    }

    fn save_section<'a>(
        &'a self,
        section: &'a str,
        updates: SectionUpdates,
    ) -> StoreFuture<'a, SaveResponse> {
        Box::pin(ConfigStore::save_section(self, section, updates))
    }
}
