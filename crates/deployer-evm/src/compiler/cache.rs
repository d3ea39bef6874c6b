use std::fs;
use std::path::{Path, PathBuf};

use super::{ArtifactProvider, CompiledArtifact};
use crate::constants::{ARTIFACT_CACHE_EXTENSION, COMPILER_OUTPUT_SUFFIX};
use crate::context::Context;
use crate::errors::DeployResult;

/// Artifact cache keyed by contract name and compiler version.
///
/// A cached artifact is only reused when it was built from the same source
/// text. Cache write failures are logged and otherwise ignored.
#[derive(Clone, Debug)]
pub struct CachedArtifactProvider<P> {
    inner: P,
    cache_dir: PathBuf,
    ctx: Context,
}

impl<P: ArtifactProvider> CachedArtifactProvider<P> {
    pub fn new(inner: P, cache_dir: impl Into<PathBuf>, ctx: &Context) -> Self {
        CachedArtifactProvider { inner, cache_dir: cache_dir.into(), ctx: ctx.clone() }
    }

    pub fn artifact_path(&self, contract_name: &str, version: &semver::Version) -> PathBuf {
        self.cache_dir
            .join(format!("{}-{}.{}", contract_name, version, ARTIFACT_CACHE_EXTENSION))
    }

    pub fn compiler_output_path(&self, contract_name: &str, version: &semver::Version) -> PathBuf {
        self.cache_dir.join(format!(
            "{}-{}.{}.{}",
            contract_name, version, COMPILER_OUTPUT_SUFFIX, ARTIFACT_CACHE_EXTENSION
        ))
    }

    fn load(&self, path: &Path, source: &str) -> Option<CompiledArtifact> {
        let content = fs::read_to_string(path).ok()?;
        let artifact: CompiledArtifact = match serde_json::from_str(&content) {
            Ok(artifact) => artifact,
            Err(e) => {
                self.ctx.try_log(|logger| {
                    warn!(logger, "Ignoring unreadable cache entry {}: {}", path.display(), e)
                });
                return None;
            }
        };
        if artifact.source_hash != CompiledArtifact::source_hash_of(source) {
            self.ctx.try_log(|logger| {
                info!(logger, "Source changed since {} was cached", path.display())
            });
            return None;
        }
        Some(artifact)
    }

    fn store(&self, artifact: &CompiledArtifact) {
        let version = &artifact.compiler_version;
        let mut writes = vec![(
            self.artifact_path(&artifact.contract_name, version),
            serde_json::to_string_pretty(artifact),
        )];
        if let Some(raw_output) = &artifact.raw_output {
            writes.push((
                self.compiler_output_path(&artifact.contract_name, version),
                serde_json::to_string_pretty(raw_output),
            ));
        }

        if let Err(e) = fs::create_dir_all(&self.cache_dir) {
            self.ctx.try_log(|logger| {
                warn!(logger, "Unable to create cache dir {}: {}", self.cache_dir.display(), e)
            });
            return;
        }
        for (path, content) in writes {
            let result = content
                .map_err(|e| e.to_string())
                .and_then(|content| fs::write(&path, content).map_err(|e| e.to_string()));
            match result {
                Ok(()) => self.ctx.try_log(|logger| {
                    debug!(logger, "Wrote {}", path.display())
                }),
                Err(e) => self.ctx.try_log(|logger| {
                    warn!(logger, "Unable to write {}: {}", path.display(), e)
                }),
            }
        }
    }
}

impl<P: ArtifactProvider> ArtifactProvider for CachedArtifactProvider<P> {
    fn compile(
        &self,
        source: &str,
        contract_name: &str,
        version: &semver::Version,
    ) -> DeployResult<CompiledArtifact> {
        let path = self.artifact_path(contract_name, version);
        if let Some(artifact) = self.load(&path, source) {
            self.ctx.try_log(|logger| {
                info!(logger, "Cache hit for {} ({})", contract_name, path.display())
            });
            return Ok(artifact);
        }

        self.ctx.try_log(|logger| info!(logger, "Cache miss for {}", contract_name));
        let artifact = self.inner.compile(source, contract_name, version)?;
        self.store(&artifact);
        Ok(artifact)
    }
}
