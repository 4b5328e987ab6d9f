//! Save/Load functionality for persisting world state
//!
//! Uses bincode for efficient binary serialization. A save holds the whole
//! store, the player identity and the generation config the world runs with.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use grandline_logic::config::GenerationConfig;

use crate::context::PlayerIdentity;
use crate::store::WorldStore;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub config: GenerationConfig,
    pub player: PlayerIdentity,
    pub store: WorldStore,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Codec(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

pub fn save_world<W: Write>(
    writer: W,
    store: &WorldStore,
    player: PlayerIdentity,
    config: &GenerationConfig,
) -> Result<(), SaveError> {
    #[derive(Serialize)]
    struct SaveRef<'a> {
        version: u32,
        config: &'a GenerationConfig,
        player: PlayerIdentity,
        store: &'a WorldStore,
    }
    bincode::serialize_into(
        writer,
        &SaveRef {
            version: SAVE_VERSION,
            config,
            player,
            store,
        },
    )?;
    Ok(())
}

pub fn load_world<R: Read>(reader: R) -> Result<SaveData, SaveError> {
    let save: SaveData = bincode::deserialize_from(reader)?;
    if save.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save.version,
        });
    }
    log::info!(
        "loaded save: {} characters, {} crews, {} battles",
        save.store.characters.len(),
        save.store.crews.len(),
        save.store.battles.len()
    );
    Ok(save)
}

pub fn save_world_to_path(
    path: &Path,
    store: &WorldStore,
    player: PlayerIdentity,
    config: &GenerationConfig,
) -> Result<(), SaveError> {
    let mut writer = BufWriter::new(File::create(path)?);
    save_world(&mut writer, store, player, config)?;
    writer.flush()?;
    Ok(())
}

pub fn load_world_from_path(path: &Path) -> Result<SaveData, SaveError> {
    load_world(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use grandline_logic::entities::CrewType;

    #[test]
    fn test_save_load_roundtrip() {
        let mut fx = Fixture::new(12);
        let island = fx.island(4);
        let (crew, captain) = fx.crew(CrewType::Pirate, island, 15);
        fx.member(crew, 3, 40);
        fx.territory(island, Some(crew));
        fx.make_player(captain);

        let mut buffer = Vec::new();
        save_world(&mut buffer, &fx.ctx.store, fx.ctx.player, &fx.ctx.config).expect("Save failed");
        let loaded = load_world(&buffer[..]).expect("Load failed");

        assert_eq!(loaded.version, SAVE_VERSION);
        assert_eq!(loaded.store, fx.ctx.store);
        assert_eq!(loaded.player, fx.ctx.player);
        assert_eq!(loaded.config, *fx.ctx.config);
    }

    #[test]
    fn loaded_store_keeps_allocating_fresh_ids() {
        let mut fx = Fixture::new(12);
        fx.island(1);
        let second = fx.island(2);
        fx.ctx.store.islands.remove(second);

        let mut buffer = Vec::new();
        save_world(&mut buffer, &fx.ctx.store, fx.ctx.player, &fx.ctx.config).unwrap();
        let loaded = load_world(&buffer[..]).unwrap();
        assert_eq!(loaded.store.islands.next_id(), fx.ctx.store.islands.next_id());
        assert!(!loaded.store.islands.contains(second));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let fx = Fixture::new(1);
        let stale = SaveData {
            version: SAVE_VERSION + 1,
            config: (*fx.ctx.config).clone(),
            player: fx.ctx.player,
            store: fx.ctx.store.clone(),
        };
        let buffer = bincode::serialize(&stale).unwrap();
        match load_world(&buffer[..]) {
            Err(SaveError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, SAVE_VERSION);
                assert_eq!(found, SAVE_VERSION + 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncated_save_is_a_codec_error() {
        let fx = Fixture::new(1);
        let mut buffer = Vec::new();
        save_world(&mut buffer, &fx.ctx.store, fx.ctx.player, &fx.ctx.config).unwrap();
        buffer.truncate(buffer.len() / 2);
        assert!(matches!(load_world(&buffer[..]), Err(SaveError::Codec(_)) | Err(SaveError::Io(_))));
    }
}
