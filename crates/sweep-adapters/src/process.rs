//! Lanzamiento de binarios externos con la salida volcada a un log.
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use sweep_core::StepError;

/// Invocación de un proceso externo.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// stdout y stderr van a este archivo.
    pub log: PathBuf,
}

impl Invocation {
    /// Ejecuta y espera. No poder lanzar el proceso o un estado != 0 son
    /// errores de ejecución; no poder crear el log es un error de IO.
    pub fn run(&self, step: &str) -> Result<(), StepError> {
        if let Some(parent) = self.log.parent() {
            fs::create_dir_all(parent).map_err(|e| StepError::io(step, parent, e))?;
        }
        let log = File::create(&self.log).map_err(|e| StepError::io(step, &self.log, e))?;
        let log_err = log.try_clone().map_err(|e| StepError::io(step, &self.log, e))?;

        log::info!("[{step}] launching {} (log: {})", self.program.display(), self.log.display());
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
           .current_dir(&self.cwd)
           .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
           .stdin(Stdio::null())
           .stdout(Stdio::from(log))
           .stderr(Stdio::from(log_err));

        let status = cmd.status()
                        .map_err(|e| StepError::execution(step, format!("failed to spawn {}: {e}", self.program.display())))?;
        if !status.success() {
            return Err(StepError::execution(step,
                                            format!("{} exited with {status} (log: {})",
                                                    self.program.display(),
                                                    self.log.display())));
        }
        Ok(())
    }
}

/// Copia `source` a `dest`, creando el directorio destino.
pub fn publish(step: &str, source: &Path, dest: &Path) -> Result<(), StepError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| StepError::io(step, parent, e))?;
    }
    if let Err(e) = fs::copy(source, dest) {
        discard(step, dest);
        return Err(StepError::io(step, dest, e));
    }
    log::info!("[{step}] copied to {}", dest.display());
    Ok(())
}

/// Elimina un artifact que quedó a medias tras un fallo, para que
/// `is_done` no lo tome por completo en la siguiente entrada.
pub fn discard(step: &str, artifact: &Path) {
    let removed = match fs::symlink_metadata(artifact) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(artifact),
        Ok(_) => fs::remove_file(artifact),
        Err(_) => return,
    };
    match removed {
        Ok(()) => log::warn!("[{step}] discarded incomplete artifact {}", artifact.display()),
        Err(e) => log::error!("[{step}] cannot discard {}: {e}", artifact.display()),
    }
}
