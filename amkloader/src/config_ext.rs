//! Extension de amkconfig pour le chargeur de pistes

use std::time::Duration;

use crate::loader::LoaderOptions;

/// Trait d'extension pour amkconfig::Config
pub trait LoaderConfigExt {
    /// Construit les options du chargeur depuis la section `loader`
    fn loader_options(&self) -> crate::Result<LoaderOptions>;
}

impl LoaderConfigExt for amkconfig::Config {
    fn loader_options(&self) -> crate::Result<LoaderOptions> {
        let timeout_ms = self.get_loader_timeout_ms()?;

        Ok(LoaderOptions::default()
            .full_metadata_required(self.get_loader_full_metadata_required()?)
            .timeout(Duration::from_millis(timeout_ms as u64))
            .recursive(self.get_loader_recursive()?)
            .audio_extensions(self.get_audio_extensions()?)
            .playlist_extensions(self.get_playlist_extensions()?))
    }
}
