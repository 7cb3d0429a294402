//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use minijinja::Environment;
use textgen_core::{
    CachingLoader, GenerationDefaults, GenerationInvoker, ModelLoader, RuntimeOptions,
    TextGenerator,
};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::settings::DefaultSettings;
use crate::templates;

/// The generation pipeline wired to the SQLite store.
pub type Generator = TextGenerator<SqliteStore, SqliteStore>;

/// State shared across all HTTP handlers.
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Profiles and chat history.
    pub store: Arc<SqliteStore>,
    /// Resolver, invoker and chat recorder.
    pub generator: Arc<Generator>,
    /// Default settings snapshot taken at startup.
    pub defaults: Arc<DefaultSettings>,
    /// HTML templates for the index page.
    pub templates: Arc<Environment<'static>>,
}

impl AppState {
    /// Wire the generation pipeline and take the default settings snapshot.
    ///
    /// With `cache_models` set, `loader` is wrapped in a [`CachingLoader`].
    pub async fn new(
        config: Config,
        store: SqliteStore,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<Self, minijinja::Error> {
        let defaults = GenerationDefaults::default().with_model_path(config.default_model_path.as_str());

        let loader: Arc<dyn ModelLoader> = if config.cache_models {
            Arc::new(CachingLoader::new(loader))
        } else {
            loader
        };
        let invoker = GenerationInvoker::new(loader, RuntimeOptions::default());
        let generator = TextGenerator::new(
            defaults,
            Arc::new(invoker),
            store.clone(),
            store.clone(),
        )
        .with_timeout(config.generation_timeout);

        let settings = DefaultSettings::load(&store, generator.defaults()).await;

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            generator: Arc::new(generator),
            defaults: Arc::new(settings),
            templates: Arc::new(templates::environment()?),
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
