//! Competitor roster and the player registry it is assembled from.
//!
//! A roster is built once, before the match starts, and never changes shape
//! afterwards. The match owns per-player running state (score, base flag);
//! the roster only answers "who carries this equipment id".

use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::Team;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_PLAYERS_PER_TEAM: usize = 15;
pub const MIN_PLAYERS: usize = 2;

/// A competitor as entered before the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable registry identifier
    pub id: u32,
    pub code_name: String,
    pub team: Team,
    /// Value carried on the wire
    pub equipment_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("{0} team is full (max {} players)", MAX_PLAYERS_PER_TEAM)]
    TeamFull(Team),
    #[error("Player ID already in use")]
    DuplicatePlayerId(u32),
    #[error("Equipment ID {0} already in use")]
    DuplicateEquipmentId(u32),
    #[error("Need at least {} players to start", MIN_PLAYERS)]
    NotEnoughPlayers,
    #[error("No code name known for player {0}")]
    UnknownPlayer(u32),
}

/// Collects players for both teams and validates the roster rules.
#[derive(Debug, Default)]
pub struct RosterBuilder {
    red: Vec<Player>,
    green: Vec<Player>,
}

impl RosterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player, returning a confirmation message on success.
    pub fn add_player(
        &mut self,
        id: u32,
        code_name: &str,
        team: Team,
        equipment_id: u32,
    ) -> Result<String, RosterError> {
        if self.team(team).len() >= MAX_PLAYERS_PER_TEAM {
            return Err(RosterError::TeamFull(team));
        }

        let everyone = || self.red.iter().chain(self.green.iter());
        if everyone().any(|p| p.id == id) {
            return Err(RosterError::DuplicatePlayerId(id));
        }
        if everyone().any(|p| p.equipment_id == equipment_id) {
            return Err(RosterError::DuplicateEquipmentId(equipment_id));
        }

        let player = Player {
            id,
            code_name: code_name.to_string(),
            team,
            equipment_id,
        };
        match team {
            Team::Red => self.red.push(player),
            Team::Green => self.green.push(player),
        }

        info!("{} added to {} team (equipment {})", code_name, team, equipment_id);
        Ok(format!("{} added to {} team", code_name, team))
    }

    /// Adds a player whose code name is looked up in the registry.
    pub fn add_registered(
        &mut self,
        registry: &dyn PlayerRegistry,
        id: u32,
        team: Team,
        equipment_id: u32,
    ) -> Result<String, RosterError> {
        let record = match registry.get_player(id) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(RosterError::UnknownPlayer(id)),
            Err(e) => {
                warn!("Registry lookup for player {} failed: {}", id, e);
                return Err(RosterError::UnknownPlayer(id));
            }
        };
        self.add_player(id, &record.code_name, team, equipment_id)
    }

    pub fn team(&self, team: Team) -> &[Player] {
        match team {
            Team::Red => &self.red,
            Team::Green => &self.green,
        }
    }

    pub fn len(&self) -> usize {
        self.red.len() + self.green.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.red.clear();
        self.green.clear();
    }

    pub fn build(self) -> Result<Roster, RosterError> {
        if self.len() < MIN_PLAYERS {
            return Err(RosterError::NotEnoughPlayers);
        }
        Ok(Roster {
            red: self.red,
            green: self.green,
        })
    }
}

/// Immutable list of competitors, in entry order per team.
#[derive(Debug, Clone)]
pub struct Roster {
    red: Vec<Player>,
    green: Vec<Player>,
}

impl Roster {
    pub fn team(&self, team: Team) -> &[Player] {
        match team {
            Team::Red => &self.red,
            Team::Green => &self.green,
        }
    }

    /// All players, red first, each team in entry order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.red.iter().chain(self.green.iter())
    }

    pub fn by_equipment(&self, equipment_id: u32) -> Option<&Player> {
        self.players().find(|p| p.equipment_id == equipment_id)
    }

    /// First player entered onto the team, credited with that team's base hits.
    pub fn captain(&self, team: Team) -> Option<&Player> {
        self.team(team).first()
    }

    pub fn len(&self) -> usize {
        self.red.len() + self.green.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One entry of the roster file handed to the station binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: u32,
    #[serde(default)]
    pub code_name: Option<String>,
    pub team: Team,
    pub equipment_id: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterFile {
    pub players: Vec<RosterEntry>,
}

impl RosterFile {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Builds a roster, filling missing code names from the registry.
    pub fn assemble(&self, registry: &dyn PlayerRegistry) -> Result<Roster, RosterError> {
        let mut builder = RosterBuilder::new();
        for entry in &self.players {
            match &entry.code_name {
                Some(name) => builder.add_player(entry.id, name, entry.team, entry.equipment_id)?,
                None => builder.add_registered(registry, entry.id, entry.team, entry.equipment_id)?,
            };
        }
        builder.build()
    }
}

/// Durable player record: roster id to code name and preferred team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: u32,
    pub code_name: String,
    #[serde(default)]
    pub team: Option<Team>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

/// Lookup store consulted during roster assembly only.
pub trait PlayerRegistry {
    fn get_player(&self, id: u32) -> Result<Option<PlayerRecord>, RegistryError>;

    /// Returns false if the id is already registered.
    fn add_player(&mut self, record: PlayerRecord) -> Result<bool, RegistryError>;

    /// Returns false if the id is unknown.
    fn update_team(&mut self, id: u32, team: Team) -> Result<bool, RegistryError>;
}

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: HashMap<u32, PlayerRecord>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerRegistry for MemoryRegistry {
    fn get_player(&self, id: u32) -> Result<Option<PlayerRecord>, RegistryError> {
        Ok(self.records.get(&id).cloned())
    }

    fn add_player(&mut self, record: PlayerRecord) -> Result<bool, RegistryError> {
        if self.records.contains_key(&record.id) {
            return Ok(false);
        }
        self.records.insert(record.id, record);
        Ok(true)
    }

    fn update_team(&mut self, id: u32, team: Team) -> Result<bool, RegistryError> {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.team = Some(team);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Registry persisted as a JSON array of records, rewritten on every change.
#[derive(Debug)]
pub struct JsonRegistry {
    path: PathBuf,
    inner: MemoryRegistry,
}

impl JsonRegistry {
    /// Opens the file, treating a missing file as an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let mut inner = MemoryRegistry::new();

        if path.exists() {
            let text = fs::read_to_string(&path)?;
            let records: Vec<PlayerRecord> = serde_json::from_str(&text)?;
            for record in records {
                inner.records.insert(record.id, record);
            }
        }

        info!(
            "Opened player registry {} ({} records)",
            path.display(),
            inner.records.len()
        );
        Ok(Self { path, inner })
    }

    fn save(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut records: Vec<&PlayerRecord> = self.inner.records.values().collect();
        records.sort_by_key(|r| r.id);
        fs::write(&self.path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }
}

impl PlayerRegistry for JsonRegistry {
    fn get_player(&self, id: u32) -> Result<Option<PlayerRecord>, RegistryError> {
        self.inner.get_player(id)
    }

    fn add_player(&mut self, record: PlayerRecord) -> Result<bool, RegistryError> {
        let added = self.inner.add_player(record)?;
        if added {
            self.save()?;
        }
        Ok(added)
    }

    fn update_team(&mut self, id: u32, team: Team) -> Result<bool, RegistryError> {
        let updated = self.inner.update_team(id, team)?;
        if updated {
            self.save()?;
        }
        Ok(updated)
    }
}
