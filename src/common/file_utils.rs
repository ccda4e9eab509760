use lazy_static::lazy_static;
use std::env;
use std::path::PathBuf;

lazy_static! {
    /// Checkpoint directory used when a configuration does not provide one.
    /// Resolved once from `PGN_CHECKPOINT_DIR`, falling back to `./train_checkpoints`.
    pub static ref DEFAULT_CHECKPOINT_DIRECTORY: PathBuf = _get_checkpoint_directory();
}

fn _get_checkpoint_directory() -> PathBuf {
    match env::var("PGN_CHECKPOINT_DIR") {
        Ok(value) => PathBuf::from(value),
        Err(_) => PathBuf::from("./train_checkpoints"),
    }
}
