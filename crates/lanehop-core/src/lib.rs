//! Core grid simulation for the lanehop crossing game.

use rand::{rngs::SmallRng, seq::index, seq::IndexedRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Number of historical grid snapshots retained by a board (index 0 = current).
pub const HISTORY_FRAMES: usize = 4;
/// Number of distinct tile states; also the width of a one-hot feature block.
pub const TILE_KINDS: usize = 13;
/// Number of curriculum levels understood by [`LevelConfig::for_level`].
pub const NUM_LEVELS: u8 = 17;

/// Horizontal extent of a car, in tiles.
pub const CAR_LENGTH: i32 = 2;
/// Horizontal extent of a log, in tiles.
pub const LOG_LENGTH: i32 = 3;

/// Ticks per train cycle spent with an empty track.
pub const TRAIN_SAFE_TIME: u32 = 5;
/// Ticks per train cycle spent flashing the crossing warning.
pub const TRAIN_WARN_TIME: u32 = 2;
/// Ticks per train cycle spent with the train occupying the row.
pub const TRAIN_DEATH_TIME: u32 = 3;
/// Full period of the train state machine.
pub const TRAIN_CYCLE_LEN: u32 = TRAIN_SAFE_TIME + TRAIN_WARN_TIME + TRAIN_DEATH_TIME;

/// Surface state of a single grid cell.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tile {
    Grass = 0,
    Tree = 1,
    Road = 2,
    Car = 3,
    Water = 4,
    Lilypad = 5,
    Log = 6,
    Track = 7,
    TrackWarning = 8,
    Train = 9,
    Finish = 10,
    Death = 11,
    /// Sentinel for window cells sampled outside the grid.
    Oob = 12,
}

/// Every tile in discriminant order.
pub const ALL_TILES: [Tile; TILE_KINDS] = [
    Tile::Grass,
    Tile::Tree,
    Tile::Road,
    Tile::Car,
    Tile::Water,
    Tile::Lilypad,
    Tile::Log,
    Tile::Track,
    Tile::TrackWarning,
    Tile::Train,
    Tile::Finish,
    Tile::Death,
    Tile::Oob,
];

impl Tile {
    /// One-hot channel of this tile.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Static classification of a board row, fixed at generation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TerrainKind {
    Grass,
    Train,
    River,
    Road,
    Finish,
}

impl TerrainKind {
    /// Tile a freshly generated grid shows for rows of this kind.
    #[must_use]
    pub const fn default_tile(self) -> Tile {
        match self {
            TerrainKind::Grass => Tile::Grass,
            TerrainKind::Train => Tile::Track,
            TerrainKind::River => Tile::Water,
            TerrainKind::Road => Tile::Road,
            TerrainKind::Finish => Tile::Finish,
        }
    }
}

/// One row's terrain record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Terrain {
    pub kind: TerrainKind,
    pub row: i32,
}

/// Per-entity outcome of a single tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    /// Nothing noteworthy happened.
    Success,
    /// The agent was killed this tick.
    Death,
    /// The agent reached the finish row.
    Win,
    /// The agent's move was blocked and rolled back.
    NoMovement,
}

/// A move the agent can take; `Stay` is recorded like any other move.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Stay,
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// The move that takes back this one.
    #[must_use]
    pub const fn reverse(self) -> Direction {
        match self {
            Direction::Stay => Direction::Stay,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// Dense width x height mapping from coordinate to [`Tile`].
///
/// Every cell always holds a defined tile; out-of-range reads return `None`
/// and out-of-range writes are ignored, mirroring how entities clip their
/// runs at the grid border.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TileGrid {
    width: i32,
    height: i32,
    cells: Vec<Tile>,
}

impl TileGrid {
    /// Construct a grid with every cell set to `fill`.
    pub fn new(width: i32, height: i32, fill: Tile) -> Result<Self, BoardError> {
        if width <= 0 || height <= 0 {
            return Err(BoardError::InvalidConfig(
                "grid dimensions must be positive",
            ));
        }
        Ok(Self {
            width,
            height,
            cells: vec![fill; (width as usize) * (height as usize)],
        })
    }

    /// Construct a grid showing each row's default terrain tile.
    fn from_terrain(terrain: &[Terrain], width: i32) -> Result<Self, BoardError> {
        let mut grid = Self::new(width, terrain.len() as i32, Tile::Grass)?;
        for record in terrain {
            grid.fill_row(record.row, record.kind.default_tile());
        }
        Ok(grid)
    }

    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Raw cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Tile] {
        &self.cells
    }

    #[inline]
    fn offset(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    /// Tile at `(x, y)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> Option<Tile> {
        if self.contains(x, y) {
            Some(self.cells[self.offset(x, y)])
        } else {
            None
        }
    }

    /// Write `tile` at `(x, y)`; writes outside the grid are dropped.
    pub fn set(&mut self, x: i32, y: i32, tile: Tile) {
        if self.contains(x, y) {
            let idx = self.offset(x, y);
            self.cells[idx] = tile;
        }
    }

    /// Stamp an entire row with `tile`.
    pub fn fill_row(&mut self, y: i32, tile: Tile) {
        if y >= 0 && y < self.height {
            let start = self.offset(0, y);
            let end = start + self.width as usize;
            self.cells[start..end].fill(tile);
        }
    }
}

/// Errors raised while constructing a board.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The requested curriculum level does not exist.
    #[error("level {0} is outside the supported range 1..=17")]
    LevelOutOfRange(u8),
}

/// Candidate ranges sampled during generation; consumed only at
/// construction time and never retained as live state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelConfig {
    pub num_rivers: Vec<u32>,
    pub num_roads: Vec<u32>,
    pub num_trains: Vec<u32>,
    pub num_trees_per_row: Vec<u32>,
    pub num_lilypads_per_row: Vec<u32>,
    pub num_logs_per_row: Vec<u32>,
    pub num_cars_per_row: Vec<u32>,
    pub car_velocities: Vec<i32>,
    pub car_move_rates: Vec<u32>,
    pub log_velocities: Vec<i32>,
    pub log_move_rates: Vec<u32>,
    /// Whether a river row holds lilypads (`true`) or logs (`false`).
    pub river_holds_lilypads: Vec<bool>,
}

impl LevelConfig {
    /// Base table used for full-size boards.
    #[must_use]
    pub fn default_table() -> Self {
        Self {
            num_rivers: vec![2, 3, 4],
            num_roads: vec![4, 5, 6],
            num_trains: vec![2, 3, 4],
            num_trees_per_row: vec![1, 2, 3, 4, 5],
            num_lilypads_per_row: vec![4, 5, 6],
            num_logs_per_row: vec![3, 4],
            num_cars_per_row: vec![2],
            car_velocities: vec![-2, -1, 1, 2],
            car_move_rates: vec![1],
            log_velocities: vec![-1, 1],
            log_move_rates: vec![1],
            river_holds_lilypads: vec![false, true],
        }
    }

    /// Base table used for mini boards.
    #[must_use]
    pub fn mini_table() -> Self {
        Self {
            num_rivers: vec![1, 2],
            num_roads: vec![1, 2],
            num_trains: vec![1, 2],
            num_trees_per_row: vec![2, 3],
            num_lilypads_per_row: vec![3, 4, 5],
            num_logs_per_row: vec![2],
            num_cars_per_row: vec![1, 2],
            car_velocities: vec![-2, -1, 1, 2],
            car_move_rates: vec![1],
            log_velocities: vec![-1, 1],
            log_move_rates: vec![1],
            river_holds_lilypads: vec![false, true],
        }
    }

    /// Resolve the curriculum table for `level` (1..=[`NUM_LEVELS`]).
    ///
    /// The curriculum introduces one obstacle family at a time: trees, then
    /// cars, then lilypads and logs, then trains, ending with every family
    /// active at once.
    pub fn for_level(level: u8, mini: bool) -> Result<Self, BoardError> {
        if level < 1 || level > NUM_LEVELS {
            return Err(BoardError::LevelOutOfRange(level));
        }

        let mut config = if mini {
            Self::mini_table()
        } else {
            Self::default_table()
        };

        if level < 2 || [3, 4, 6, 7, 10, 11, 14].contains(&level) {
            config.num_trees_per_row = vec![0];
        }
        if level < 3 || [6, 7, 8, 10, 11, 12, 14, 15].contains(&level) {
            config.num_roads = vec![0];
        }
        if level < 4 {
            config.car_velocities = vec![-1, 1];
        }
        if level < 6 || [14, 15, 16].contains(&level) {
            config.num_rivers = vec![0];
        }
        if level == 6 && !mini {
            config.num_lilypads_per_row = vec![10, 11, 12];
        }
        if level < 10 {
            config.river_holds_lilypads = vec![true];
        }
        if level == 10 {
            config.river_holds_lilypads = vec![false];
        }
        if level < 14 {
            config.num_trains = vec![0];
        }
        Ok(config)
    }

    /// Largest number of interior rows this table can ask for.
    #[must_use]
    pub fn max_terrain_rows(&self) -> u32 {
        let max = |values: &[u32]| values.iter().copied().max().unwrap_or(0);
        max(&self.num_rivers) + max(&self.num_roads) + max(&self.num_trains)
    }

    fn validate(&self) -> Result<(), BoardError> {
        if self.num_rivers.is_empty()
            || self.num_roads.is_empty()
            || self.num_trains.is_empty()
            || self.num_trees_per_row.is_empty()
            || self.num_lilypads_per_row.is_empty()
            || self.num_logs_per_row.is_empty()
            || self.num_cars_per_row.is_empty()
            || self.car_velocities.is_empty()
            || self.car_move_rates.is_empty()
            || self.log_velocities.is_empty()
            || self.log_move_rates.is_empty()
            || self.river_holds_lilypads.is_empty()
        {
            return Err(BoardError::InvalidConfig(
                "level ranges must not be empty",
            ));
        }
        if self.car_move_rates.iter().any(|&rate| rate == 0)
            || self.log_move_rates.iter().any(|&rate| rate == 0)
        {
            return Err(BoardError::InvalidConfig(
                "move rates must be at least one tick",
            ));
        }
        Ok(())
    }
}

/// Static configuration for a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardConfig {
    /// Board width in tiles.
    pub width: i32,
    /// Board height in tiles.
    pub height: i32,
    /// Curriculum level (1..=[`NUM_LEVELS`]).
    pub level: u8,
    /// Use the mini level tables.
    pub mini: bool,
    /// Feature-window rows sampled toward the finish line.
    pub look_behind: i32,
    /// Feature-window rows sampled toward the start row.
    pub look_ahead: i32,
    /// Optional RNG seed for reproducible generation.
    pub rng_seed: Option<u64>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            level: 1,
            mini: false,
            look_behind: 2,
            look_ahead: 4,
            rng_seed: None,
        }
    }
}

impl BoardConfig {
    /// Default configuration for the smaller mini board.
    #[must_use]
    pub fn mini(level: u8) -> Self {
        Self {
            width: 10,
            height: 10,
            level,
            mini: true,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), BoardError> {
        if self.width < 2 {
            return Err(BoardError::InvalidConfig(
                "board width must be at least 2 tiles",
            ));
        }
        if self.height < 4 {
            return Err(BoardError::InvalidConfig(
                "board height must leave at least one interior row",
            ));
        }
        if self.look_behind < 0 || self.look_ahead < 0 {
            return Err(BoardError::InvalidConfig(
                "feature window extents must be non-negative",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, drawing a seed from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// The controlled character: grid position plus a one-move undo memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    x: i32,
    y: i32,
    spawn_x: i32,
    spawn_y: i32,
    width: i32,
    height: i32,
    last_move: Option<Direction>,
}

impl Agent {
    /// Place an agent at `(x, y)` on a `width` x `height` board.
    #[must_use]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            spawn_x: x,
            spawn_y: y,
            width,
            height,
            last_move: None,
        }
    }

    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Construction-time spawn cell.
    #[must_use]
    pub const fn spawn(&self) -> (i32, i32) {
        (self.spawn_x, self.spawn_y)
    }

    /// Most recent move, if any was recorded since the last reset.
    #[must_use]
    pub const fn last_move(&self) -> Option<Direction> {
        self.last_move
    }

    /// Apply a move, clamped at the grid border, and record it.
    ///
    /// The record is always overwritten, never cleared; only [`Agent::reset`]
    /// clears it.
    pub fn apply_move(&mut self, direction: Direction) {
        match direction {
            Direction::Left => {
                if self.x > 0 {
                    self.x -= 1;
                }
            }
            Direction::Right => {
                if self.x < self.width - 1 {
                    self.x += 1;
                }
            }
            Direction::Up => {
                if self.y > 0 {
                    self.y -= 1;
                }
            }
            Direction::Down => {
                if self.y < self.height - 1 {
                    self.y += 1;
                }
            }
            Direction::Stay => {}
        }
        self.last_move = Some(direction);
    }

    /// Take back the last recorded move.
    ///
    /// # Panics
    ///
    /// Panics if no move has been recorded since construction or the last
    /// reset; that is a caller bug, not an in-game event.
    pub fn undo_last_move(&mut self) {
        let last = self
            .last_move
            .expect("agent cannot undo without a recorded move");
        self.apply_move(last.reverse());
    }

    /// Return to the spawn cell and clear the move record.
    pub fn reset(&mut self) {
        self.x = self.spawn_x;
        self.y = self.spawn_y;
        self.last_move = None;
    }
}

/// Stateless finish-line check on its row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinZone {
    row: i32,
}

impl WinZone {
    #[must_use]
    pub const fn new(row: i32) -> Self {
        Self { row }
    }

    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    fn update(&self, _grid: &mut TileGrid, agent: &Agent) -> Status {
        if agent.y() == self.row {
            Status::Win
        } else {
            Status::Success
        }
    }
}

/// The hazard band at the bottom of the board, creeping upward one row
/// every `growth_rate` ticks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeathZone {
    boundary: i32,
    floor: i32,
    growth_rate: u32,
    counter: u32,
}

impl DeathZone {
    /// A zone that starts below a board of the given height.
    #[must_use]
    pub const fn new(height: i32, growth_rate: u32) -> Self {
        Self {
            boundary: height,
            floor: height,
            growth_rate,
            counter: growth_rate,
        }
    }

    /// First row currently inside the zone.
    #[must_use]
    pub const fn boundary(&self) -> i32 {
        self.boundary
    }

    #[must_use]
    pub const fn growth_rate(&self) -> u32 {
        self.growth_rate
    }

    fn update(&mut self, grid: &mut TileGrid, agent: &Agent) -> Status {
        self.counter -= 1;
        if self.counter == 0 {
            if self.boundary > 0 {
                self.boundary -= 1;
            }
            self.counter = self.growth_rate;
        }

        for row in self.boundary..self.floor {
            grid.fill_row(row, Tile::Death);
        }

        if agent.y() >= self.boundary {
            Status::Death
        } else {
            Status::Success
        }
    }

    fn reset(&mut self) {
        self.boundary = self.floor;
        self.counter = self.growth_rate;
    }
}

/// A static obstacle that blocks the agent's cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tree {
    x: i32,
    y: i32,
}

impl Tree {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    fn update(&self, grid: &mut TileGrid, agent: &mut Agent) -> Status {
        grid.set(self.x, self.y, Tile::Tree);

        if agent.x() == self.x && agent.y() == self.y {
            // The agent can only be here by having just moved in.
            agent.undo_last_move();
            return Status::NoMovement;
        }
        Status::Success
    }
}

/// A moving run of [`CAR_LENGTH`] cells on a road row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Car {
    spawn_x: i32,
    x1: i32,
    x2: i32,
    row: i32,
    velocity: i32,
    move_rate: u32,
    move_counter: u32,
}

impl Car {
    /// Spawn a car whose run starts at column `x`.
    ///
    /// `velocity` is tiles per movement (negative = leftward); `move_rate`
    /// is ticks per movement and must be at least 1.
    #[must_use]
    pub const fn new(x: i32, row: i32, velocity: i32, move_rate: u32) -> Self {
        Self {
            spawn_x: x,
            x1: x,
            x2: x + CAR_LENGTH,
            row,
            velocity,
            move_rate,
            move_counter: move_rate,
        }
    }

    /// Current run `[x1, x2)`; `x1` may sit left of the grid while the run
    /// straddles the wrap seam.
    #[must_use]
    pub const fn span(&self) -> (i32, i32) {
        (self.x1, self.x2)
    }

    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    fn update(&mut self, grid: &mut TileGrid, agent: &Agent) -> Status {
        for col in self.x1..self.x2 {
            grid.set(col, self.row, Tile::Road);
        }

        self.move_counter -= 1;
        if self.move_counter == 0 {
            self.x1 += self.velocity;
            self.x2 = self.x1 + CAR_LENGTH;
            self.move_counter = self.move_rate;
        }

        // Runs cycle over width + length columns so a run straddling the
        // border stays representable as a single interval.
        self.x2 = self.x2.rem_euclid(grid.width() + CAR_LENGTH);
        self.x1 = self.x2 - CAR_LENGTH;

        for col in self.x1..self.x2 {
            grid.set(col, self.row, Tile::Car);
        }

        if agent.y() == self.row && self.x1 <= agent.x() && agent.x() < self.x2 {
            return Status::Death;
        }
        Status::Success
    }

    fn reset(&mut self) {
        self.x1 = self.spawn_x;
        self.x2 = self.spawn_x + CAR_LENGTH;
        self.move_counter = self.move_rate;
    }
}

/// A safe stepping stone on a river row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lilypad {
    x: i32,
    y: i32,
}

impl Lilypad {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    fn update(&self, grid: &mut TileGrid, _agent: &Agent) -> Status {
        grid.set(self.x, self.y, Tile::Lilypad);
        Status::Success
    }
}

/// A floating run of [`LOG_LENGTH`] cells that carries the agent with it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Log {
    spawn_x: i32,
    x1: i32,
    x2: i32,
    row: i32,
    velocity: i32,
    move_rate: u32,
    move_counter: u32,
}

impl Log {
    /// Spawn a log whose run starts at column `x`.
    #[must_use]
    pub const fn new(x: i32, row: i32, velocity: i32, move_rate: u32) -> Self {
        Self {
            spawn_x: x,
            x1: x,
            x2: x + LOG_LENGTH,
            row,
            velocity,
            move_rate,
            move_counter: move_rate,
        }
    }

    /// Current run `[x1, x2)`.
    #[must_use]
    pub const fn span(&self) -> (i32, i32) {
        (self.x1, self.x2)
    }

    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    fn update(&mut self, grid: &mut TileGrid, agent: &mut Agent) -> Status {
        for col in self.x1..self.x2 {
            grid.set(col, self.row, Tile::Water);
        }

        self.move_counter -= 1;
        if self.move_counter == 0 {
            // Riding is judged against the pre-shift run.
            // TODO: when the run straddles the wrap seam, x1 sits left of the
            // grid and an agent just inside the seam can be dragged without
            // visibly standing on the log; revisit with the run representation.
            if agent.y() == self.row && self.x1 <= agent.x() && agent.x() < self.x2 {
                agent.x += self.velocity;
            }

            self.move_counter = self.move_rate;
            self.x1 += self.velocity;
            self.x2 = self.x1 + LOG_LENGTH;
        }

        self.x2 = self.x2.rem_euclid(grid.width() + LOG_LENGTH);
        self.x1 = self.x2 - LOG_LENGTH;

        for col in self.x1..self.x2 {
            grid.set(col, self.row, Tile::Log);
        }

        // A ride can push the agent off the board, which is fatal.
        if agent.x() < 0 || agent.x() >= grid.width() {
            return Status::Death;
        }
        Status::Success
    }

    fn reset(&mut self) {
        self.x1 = self.spawn_x;
        self.x2 = self.spawn_x + LOG_LENGTH;
        self.move_counter = self.move_rate;
    }
}

/// Track occupancy state of a train row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrainPhase {
    Safe,
    Warn,
    Death,
}

impl TrainPhase {
    #[must_use]
    pub const fn tile(self) -> Tile {
        match self {
            TrainPhase::Safe => Tile::Track,
            TrainPhase::Warn => Tile::TrackWarning,
            TrainPhase::Death => Tile::Train,
        }
    }
}

/// A full-row train cycling through safe / warn / death phases.
///
/// The cycle always replays the same phase sequence relative to level
/// start: reset restores the original random offset, not zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Train {
    row: i32,
    start_counter: u32,
    counter: u32,
}

impl Train {
    /// Spawn a train with the given phase offset into its cycle.
    #[must_use]
    pub const fn new(row: i32, start_counter: u32) -> Self {
        let start = start_counter % TRAIN_CYCLE_LEN;
        Self {
            row,
            start_counter: start,
            counter: start,
        }
    }

    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Phase for the current counter value.
    #[must_use]
    pub fn phase(&self) -> TrainPhase {
        Self::phase_at(self.counter)
    }

    fn phase_at(counter: u32) -> TrainPhase {
        let c = counter % TRAIN_CYCLE_LEN;
        if c < TRAIN_SAFE_TIME {
            TrainPhase::Safe
        } else if c < TRAIN_SAFE_TIME + TRAIN_WARN_TIME {
            TrainPhase::Warn
        } else if c < TRAIN_CYCLE_LEN {
            TrainPhase::Death
        } else {
            unreachable!("train counter escaped its cycle")
        }
    }

    fn update(&mut self, grid: &mut TileGrid, agent: &Agent) -> Status {
        self.counter += 1;

        let phase = self.phase();
        grid.fill_row(self.row, phase.tile());

        if phase == TrainPhase::Death && agent.y() == self.row {
            return Status::Death;
        }
        Status::Success
    }

    fn reset(&mut self) {
        self.counter = self.start_counter;
    }
}

/// A board entity: owns its positional/cyclic state and implements the
/// shared update protocol against the tile grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Entity {
    Tree(Tree),
    Car(Car),
    Lilypad(Lilypad),
    Log(Log),
    Train(Train),
    DeathZone(DeathZone),
    WinZone(WinZone),
}

impl Entity {
    /// Advance this entity one tick, stamping the grid in place and possibly
    /// moving the agent. Returns the entity's status for the tick.
    pub fn update(&mut self, grid: &mut TileGrid, agent: &mut Agent) -> Status {
        match self {
            Entity::Tree(tree) => tree.update(grid, agent),
            Entity::Car(car) => car.update(grid, agent),
            Entity::Lilypad(lilypad) => lilypad.update(grid, agent),
            Entity::Log(log) => log.update(grid, agent),
            Entity::Train(train) => train.update(grid, agent),
            Entity::DeathZone(zone) => zone.update(grid, agent),
            Entity::WinZone(zone) => zone.update(grid, agent),
        }
    }

    /// Restore construction-time mutable state. Idempotent.
    pub fn reset(&mut self) {
        match self {
            Entity::Car(car) => car.reset(),
            Entity::Log(log) => log.reset(),
            Entity::Train(train) => train.reset(),
            Entity::DeathZone(zone) => zone.reset(),
            Entity::Tree(_) | Entity::Lilypad(_) | Entity::WinZone(_) => {}
        }
    }

    #[must_use]
    pub const fn is_win_zone(&self) -> bool {
        matches!(self, Entity::WinZone(_))
    }

    #[must_use]
    pub const fn is_death_zone(&self) -> bool {
        matches!(self, Entity::DeathZone(_))
    }
}

/// Monotonic tick counter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Outcome of one board tick: the per-entity statuses in update order, the
/// synthesized water-death status last, plus aggregate flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub tick: Tick,
    pub statuses: Vec<Status>,
    /// Any entity (or the water check) reported a death this tick; the
    /// board has already reset itself when this is set.
    pub death: bool,
    /// The agent stood on the finish row this tick.
    pub win: bool,
}

/// Extent of the observation window sampled around the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureWindow {
    pub look_left: i32,
    pub look_right: i32,
    pub look_behind: i32,
    pub look_ahead: i32,
}

impl FeatureWindow {
    /// Length of the flattened feature vector this window produces.
    #[must_use]
    pub const fn feature_len(&self) -> usize {
        HISTORY_FRAMES
            * (self.look_left + self.look_right + 1) as usize
            * (self.look_behind + self.look_ahead + 1) as usize
            * TILE_KINDS
    }
}

/// Aggregate root: terrain rows, the ordered entity list, the agent, and a
/// fixed ring of historical grid snapshots.
///
/// Randomness is consumed at construction only; ticking is fully
/// deterministic given the generated layout.
#[derive(Debug, Clone)]
pub struct Board {
    config: BoardConfig,
    terrain: Vec<Terrain>,
    entities: Vec<Entity>,
    agent: Agent,
    frames: Vec<TileGrid>,
    window: FeatureWindow,
    tick: Tick,
}

impl Board {
    /// Generate a board for the configured level.
    pub fn new(config: BoardConfig) -> Result<Self, BoardError> {
        let table = LevelConfig::for_level(config.level, config.mini)?;
        Self::with_level_table(config, &table)
    }

    /// Generate a board from an explicit level table (the caller is the
    /// level-config provider).
    pub fn with_level_table(config: BoardConfig, table: &LevelConfig) -> Result<Self, BoardError> {
        config.validate()?;
        table.validate()?;

        let interior_rows = (config.height - 3) as u32;
        if table.max_terrain_rows() > interior_rows {
            return Err(BoardError::InvalidConfig(
                "board height cannot fit the configured terrain rows",
            ));
        }

        let mut rng = config.seeded_rng();
        let terrain = generate_terrain(&mut rng, table, config.height);
        let entities = generate_entities(&mut rng, table, &terrain, config.width, config.height);

        assert_eq!(
            terrain.len(),
            config.height as usize,
            "terrain list must cover every row"
        );
        assert!(
            matches!(entities.last(), Some(Entity::DeathZone(_))),
            "entity list must end with the death zone"
        );
        assert_eq!(
            entities.iter().filter(|entity| entity.is_win_zone()).count(),
            1,
            "entity list must contain exactly one win zone"
        );

        let grid = TileGrid::from_terrain(&terrain, config.width)?;
        let frames = vec![grid; HISTORY_FRAMES];
        let agent = Agent::new(config.width / 2, config.height - 1, config.width, config.height);
        let window = FeatureWindow {
            look_left: config.width / 2,
            look_right: config.width / 2,
            look_behind: config.look_behind,
            look_ahead: config.look_ahead,
        };

        Ok(Self {
            config,
            terrain,
            entities,
            agent,
            frames,
            window,
            tick: Tick::zero(),
        })
    }

    /// Advance the simulation one tick.
    ///
    /// Rotates the history ring, updates every entity in list order against
    /// the newest grid, applies the separate fell-in-the-river check, and on
    /// death resets all entities and the agent before returning.
    pub fn tick(&mut self) -> TickOutcome {
        self.tick = self.tick.next();

        // The oldest snapshot is dropped, survivors shift one slot older,
        // and the newest slot starts as a copy of last tick's final grid.
        self.frames.pop();
        let copy = self.frames[0].clone();
        self.frames.insert(1, copy);

        let mut statuses = Vec::with_capacity(self.entities.len() + 1);
        let mut death = false;
        let mut win = false;

        for entity in &mut self.entities {
            let status = entity.update(&mut self.frames[0], &mut self.agent);
            match status {
                Status::Death => death = true,
                Status::Win => win = true,
                Status::Success | Status::NoMovement => {}
            }
            statuses.push(status);
        }

        // Fell in the river: standing on bare water with no entity having
        // already reported a death.
        if !death && self.frames[0].get(self.agent.x, self.agent.y) == Some(Tile::Water) {
            death = true;
            statuses.push(Status::Death);
        } else {
            statuses.push(Status::Success);
        }

        if death {
            for entity in &mut self.entities {
                entity.reset();
            }
            self.agent.reset();
        }

        TickOutcome {
            tick: self.tick,
            statuses,
            death,
            win,
        }
    }

    /// Move the agent one cell (clamped at the border) and record the move.
    pub fn move_agent(&mut self, direction: Direction) {
        self.agent.apply_move(direction);
    }

    /// Take back the agent's last recorded move.
    ///
    /// # Panics
    ///
    /// Panics if no move has been recorded since construction or the last
    /// reset.
    pub fn undo_last_move(&mut self) {
        self.agent.undo_last_move();
    }

    /// Flattened one-hot observation of the window around the agent across
    /// all [`HISTORY_FRAMES`] snapshots.
    ///
    /// Cells left or right of the grid, and rows above the finish line,
    /// sample as [`Tile::Oob`]; rows below the floor sample as
    /// [`Tile::Death`].
    #[must_use]
    pub fn extract_features(&self) -> Vec<f32> {
        let window = &self.window;
        let mut features = vec![0.0f32; window.feature_len()];
        let mut offset = 0;

        for frame in &self.frames {
            for x in (self.agent.x - window.look_left)..=(self.agent.x + window.look_right) {
                for y in (self.agent.y - window.look_behind)..=(self.agent.y + window.look_ahead) {
                    let tile = if x < 0 || x >= self.config.width || y < 0 {
                        Tile::Oob
                    } else if y >= self.config.height {
                        Tile::Death
                    } else {
                        frame
                            .get(x, y)
                            .expect("window cell inside the grid must be defined")
                    };
                    features[offset + tile.index()] = 1.0;
                    offset += TILE_KINDS;
                }
            }
        }

        debug_assert_eq!(offset, features.len(), "feature count mismatch");
        features
    }

    #[must_use]
    pub const fn width(&self) -> i32 {
        self.config.width
    }

    #[must_use]
    pub const fn height(&self) -> i32 {
        self.config.height
    }

    /// Board configuration as supplied at construction.
    #[must_use]
    pub const fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick_count(&self) -> Tick {
        self.tick
    }

    /// Per-row terrain records (row 0 is the finish line).
    #[must_use]
    pub fn terrain(&self) -> &[Terrain] {
        &self.terrain
    }

    /// Entities in update/draw order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The current (newest) grid snapshot.
    #[must_use]
    pub fn grid(&self) -> &TileGrid {
        &self.frames[0]
    }

    /// All retained snapshots, newest first.
    #[must_use]
    pub fn frames(&self) -> &[TileGrid] {
        &self.frames
    }

    /// The observation window used by [`Board::extract_features`].
    #[must_use]
    pub const fn window(&self) -> &FeatureWindow {
        &self.window
    }
}

/// Assign terrain kinds to interior rows by sampling distinct rows without
/// replacement and partitioning them into river/road/train subsets.
///
/// River rows additionally pass a one-pass adjacency filter: of two
/// neighboring picks the later one is dropped (not re-sampled), so the
/// final river count may come in under the sampled one.
fn generate_terrain(rng: &mut SmallRng, table: &LevelConfig, height: i32) -> Vec<Terrain> {
    let mut terrain: Vec<Terrain> = (0..height)
        .map(|row| Terrain {
            kind: TerrainKind::Grass,
            row,
        })
        .collect();
    terrain[0].kind = TerrainKind::Finish;

    let num_rivers = sample_count(rng, &table.num_rivers) as usize;
    let num_roads = sample_count(rng, &table.num_roads) as usize;
    let num_trains = sample_count(rng, &table.num_trains) as usize;

    // Interior rows exclude the finish line and the two reserved bottom rows.
    let interior: Vec<i32> = (1..height - 2).collect();
    let drawn: Vec<i32> = index::sample(rng, interior.len(), num_rivers + num_roads + num_trains)
        .iter()
        .map(|idx| interior[idx])
        .collect();

    let mut rivers: Vec<i32> = drawn[..num_rivers].to_vec();
    let roads = &drawn[num_rivers..num_rivers + num_roads];
    let trains = &drawn[num_rivers + num_roads..];

    rivers.sort_unstable();
    let mut kept_rivers: Vec<i32> = Vec::with_capacity(rivers.len());
    for row in rivers {
        if kept_rivers.last().map_or(true, |&prev| row - prev > 1) {
            kept_rivers.push(row);
        }
    }

    for &row in roads {
        terrain[row as usize].kind = TerrainKind::Road;
    }
    for &row in &kept_rivers {
        terrain[row as usize].kind = TerrainKind::River;
    }
    for &row in trains {
        terrain[row as usize].kind = TerrainKind::Train;
    }

    terrain
}

/// Populate entities row by row from the terrain, with the win zone first
/// and the death zone last.
fn generate_entities(
    rng: &mut SmallRng,
    table: &LevelConfig,
    terrain: &[Terrain],
    width: i32,
    height: i32,
) -> Vec<Entity> {
    let mut entities = vec![Entity::WinZone(WinZone::new(0))];

    // One row of placement memory: trees avoid the previous row's lilypad
    // columns and vice versa, so a diagonal path always exists.
    let mut prev_tree_columns: HashSet<i32> = HashSet::new();
    let mut prev_lily_columns: HashSet<i32> = HashSet::new();

    for row in 1..height - 2 {
        let kind = terrain[row as usize].kind;
        let mut tree_columns: HashSet<i32> = HashSet::new();
        let mut lily_columns: HashSet<i32> = HashSet::new();

        match kind {
            TerrainKind::Grass => {
                if rng.random::<bool>() {
                    let count = sample_count(rng, &table.num_trees_per_row);
                    for _ in 0..count {
                        let open: Vec<i32> = (0..width)
                            .filter(|x| {
                                !prev_lily_columns.contains(x) && !tree_columns.contains(x)
                            })
                            .collect();
                        if let Some(&x) = open.choose(rng) {
                            entities.push(Entity::Tree(Tree::new(x, row)));
                            tree_columns.insert(x);
                        }
                    }
                }
            }
            TerrainKind::River => {
                if sample_flag(rng, &table.river_holds_lilypads) {
                    let count = sample_count(rng, &table.num_lilypads_per_row);
                    for _ in 0..count {
                        let open: Vec<i32> = (0..width)
                            .filter(|x| {
                                !prev_tree_columns.contains(x) && !lily_columns.contains(x)
                            })
                            .collect();
                        if let Some(&x) = open.choose(rng) {
                            entities.push(Entity::Lilypad(Lilypad::new(x, row)));
                            lily_columns.insert(x);
                        }
                    }
                } else {
                    let count = sample_count(rng, &table.num_logs_per_row);
                    let velocity = sample_value(rng, &table.log_velocities);
                    let move_rate = sample_count(rng, &table.log_move_rates);
                    place_runs(rng, width, LOG_LENGTH, count, |x| {
                        entities.push(Entity::Log(Log::new(x, row, velocity, move_rate)));
                    });
                }
            }
            TerrainKind::Road => {
                let count = sample_count(rng, &table.num_cars_per_row);
                let velocity = sample_value(rng, &table.car_velocities);
                let move_rate = sample_count(rng, &table.car_move_rates);
                place_runs(rng, width, CAR_LENGTH, count, |x| {
                    entities.push(Entity::Car(Car::new(x, row, velocity, move_rate)));
                });
            }
            TerrainKind::Train => {
                entities.push(Entity::Train(Train::new(row, rng.random_range(0..=100))));
            }
            TerrainKind::Finish => {}
        }

        prev_tree_columns = tree_columns;
        prev_lily_columns = lily_columns;
    }

    let growth_rate = (width as u32).div_ceil(2);
    entities.push(Entity::DeathZone(DeathZone::new(height, growth_rate)));

    entities
}

/// Pick distinct start columns so that no two runs in the row overlap: each
/// placement blocks the window `[x - length, x + length)` for later ones.
/// Placement stops early once no open column remains.
fn place_runs(
    rng: &mut SmallRng,
    width: i32,
    length: i32,
    count: u32,
    mut place: impl FnMut(i32),
) {
    let mut blocked: HashSet<i32> = HashSet::new();
    for _ in 0..count {
        let open: Vec<i32> = (0..width).filter(|x| !blocked.contains(x)).collect();
        let Some(&x) = open.choose(rng) else {
            break;
        };
        blocked.extend((x - length)..(x + length));
        place(x);
    }
}

fn sample_count(rng: &mut SmallRng, values: &[u32]) -> u32 {
    *values
        .choose(rng)
        .expect("level ranges are validated non-empty")
}

fn sample_value(rng: &mut SmallRng, values: &[i32]) -> i32 {
    *values
        .choose(rng)
        .expect("level ranges are validated non-empty")
}

fn sample_flag(rng: &mut SmallRng, values: &[bool]) -> bool {
    *values
        .choose(rng)
        .expect("level ranges are validated non-empty")
}
