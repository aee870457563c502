//! Game engine: grid of numbered blocks, target sums, selection, scoring, modes.

use crate::Mode;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Grid height in rows; row 0 is the top, `GRID_ROWS - 1` the bottom.
pub const GRID_ROWS: usize = 10;
/// Grid width in columns.
pub const GRID_COLS: usize = 7;
/// Block values are drawn uniformly from `1..=MAX_VALUE`.
pub const MAX_VALUE: u8 = 9;
/// Number of fully populated bottom rows at the start of a round.
pub const INITIAL_ROWS: usize = 4;
/// Time-mode countdown start, in seconds.
pub const TIME_LIMIT: u32 = 10;
/// Combo multiplier cap.
pub const MAX_COMBO: u32 = 5;

/// Target handed out when the grid is empty.
const FALLBACK_TARGET: u32 = 10;

/// Opaque block identifier, unique for the lifetime of a round's factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

/// A numbered tile occupying one grid cell. `row`/`col` are mutated in place
/// as the block shifts or settles; identity is the `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub value: u8,
    pub row: usize,
    pub col: usize,
}

/// Produces blocks with counter-based ids and uniformly random values.
/// Owns the round's RNG; seedable for deterministic play and tests.
#[derive(Debug)]
pub struct BlockFactory {
    next_id: u32,
    rng: SmallRng,
}

impl BlockFactory {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            next_id: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn create_block(&mut self, row: usize, col: usize) -> Block {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        Block {
            id,
            value: self.rng.random_range(1..=MAX_VALUE),
            row,
            col,
        }
    }
}

impl Default for BlockFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of attempting to insert a new bottom row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum RowInsert {
    Added,
    /// Row 0 was occupied; the grid is unchanged.
    Overflow,
}

/// Sparse collection of blocks on the `GRID_ROWS` × `GRID_COLS` lattice.
/// At most one block occupies any (row, col).
#[derive(Debug, Clone, Default)]
pub struct Grid {
    blocks: Vec<Block>,
}

impl Grid {
    /// Fresh grid with the bottom `INITIAL_ROWS` rows fully populated.
    pub fn initial(factory: &mut BlockFactory) -> Self {
        let mut blocks = Vec::with_capacity(INITIAL_ROWS * GRID_COLS);
        for row in (GRID_ROWS - INITIAL_ROWS)..GRID_ROWS {
            for col in 0..GRID_COLS {
                blocks.push(factory.create_block(row, col));
            }
        }
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn at(&self, row: usize, col: usize) -> Option<&Block> {
        self.blocks.iter().find(|b| b.row == row && b.col == col)
    }

    /// Shift every block up one row and append a fresh bottom row.
    /// Fails with [`RowInsert::Overflow`] when row 0 is occupied, leaving
    /// the grid untouched; this is the only way a round can end.
    pub fn add_new_row(&mut self, factory: &mut BlockFactory) -> RowInsert {
        if self.blocks.iter().any(|b| b.row == 0) {
            return RowInsert::Overflow;
        }
        for b in &mut self.blocks {
            b.row -= 1;
        }
        for col in 0..GRID_COLS {
            self.blocks.push(factory.create_block(GRID_ROWS - 1, col));
        }
        RowInsert::Added
    }

    /// Remove the given blocks, then settle each column independently:
    /// survivors keep their relative vertical order and are packed down
    /// against the bottom row.
    pub fn clear_and_compact(&mut self, cleared: &[BlockId]) {
        self.blocks.retain(|b| !cleared.contains(&b.id));
        for col in 0..GRID_COLS {
            let mut column: Vec<&mut Block> =
                self.blocks.iter_mut().filter(|b| b.col == col).collect();
            column.sort_by(|a, b| b.row.cmp(&a.row));
            for (i, b) in column.iter_mut().enumerate() {
                b.row = GRID_ROWS - 1 - i;
            }
        }
    }
}

/// Sum of 2–4 randomly sampled distinct blocks, so the target is always
/// reachable at the moment it is generated. Empty grid falls back to a
/// fixed target.
pub fn generate_target<R: Rng>(grid: &Grid, rng: &mut R) -> u32 {
    if grid.is_empty() {
        return FALLBACK_TARGET;
    }
    let k = rng.random_range(2..=4_usize).min(grid.len());
    rand::seq::index::sample(rng, grid.len(), k)
        .iter()
        .map(|i| u32::from(grid.blocks[i].value))
        .sum()
}

/// Outbound engine events, drained by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A selection summed to the target. `blocks` are the cleared blocks at
    /// their pre-compaction positions; `points` is the score awarded.
    BlocksCleared {
        blocks: Vec<Block>,
        points: u32,
        combo: u32,
    },
    RowAdded,
    GameOver {
        score: u32,
    },
}

/// Full state of one round. Mutated only through the methods below, each of
/// which runs to completion; the UI reads it between transitions.
#[derive(Debug)]
pub struct GameState {
    pub grid: Grid,
    pub target: u32,
    /// Selected block ids in selection order.
    pub selected: Vec<BlockId>,
    pub score: u32,
    /// Multiplier in `1..=MAX_COMBO`; grows on time-mode successes.
    pub combo: u32,
    pub mode: Mode,
    /// Seconds remaining until a forced row insertion (time mode only).
    pub time_left: u32,
    pub game_over: bool,
    pub paused: bool,
    factory: BlockFactory,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(mode: Mode) -> Self {
        Self::with_factory(mode, BlockFactory::new())
    }

    /// Deterministic round for a given seed.
    pub fn with_seed(mode: Mode, seed: u64) -> Self {
        Self::with_factory(mode, BlockFactory::seeded(seed))
    }

    fn with_factory(mode: Mode, mut factory: BlockFactory) -> Self {
        let grid = Grid::initial(&mut factory);
        let target = generate_target(&grid, &mut factory.rng);
        Self {
            grid,
            target,
            selected: Vec::new(),
            score: 0,
            combo: 1,
            mode,
            time_left: TIME_LIMIT,
            game_over: false,
            paused: false,
            factory,
            events: Vec::new(),
        }
    }

    /// Drain queued events for the presentation layer.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_selected(&self, id: BlockId) -> bool {
        self.selected.contains(&id)
    }

    /// Sum of the currently selected block values.
    pub fn selection_sum(&self) -> u32 {
        self.selected
            .iter()
            .filter_map(|&id| self.grid.get(id))
            .map(|b| u32::from(b.value))
            .sum()
    }

    /// Flip membership of `id` in the selection, then evaluate the sum.
    /// Ignored while paused or after game over; unknown ids are a no-op.
    pub fn toggle_select(&mut self, id: BlockId) {
        if self.game_over || self.paused {
            return;
        }
        if self.grid.get(id).is_none() {
            return;
        }
        if let Some(pos) = self.selected.iter().position(|&s| s == id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(id);
        }
        self.evaluate_selection();
    }

    fn evaluate_selection(&mut self) {
        let sum = self.selection_sum();
        if sum == self.target && self.target != 0 {
            self.award_clear();
        } else if sum > self.target {
            // Bust: selection and combo reset, grid untouched.
            self.selected.clear();
            self.combo = 1;
        }
    }

    fn award_clear(&mut self) {
        let blocks: Vec<Block> = self
            .selected
            .iter()
            .filter_map(|&id| self.grid.get(id).copied())
            .collect();
        let points = self.target * blocks.len() as u32 * self.combo;
        let combo = self.combo;
        self.score += points;
        let ids: Vec<BlockId> = self.selected.drain(..).collect();
        self.grid.clear_and_compact(&ids);
        self.events.push(GameEvent::BlocksCleared {
            blocks,
            points,
            combo,
        });
        match self.mode {
            Mode::Classic => self.insert_row(),
            Mode::Time => {
                self.time_left = TIME_LIMIT;
                self.combo = (self.combo + 1).min(MAX_COMBO);
            }
        }
        if !self.game_over {
            self.target = generate_target(&self.grid, &mut self.factory.rng);
        }
    }

    fn insert_row(&mut self) {
        if self.game_over {
            return;
        }
        match self.grid.add_new_row(&mut self.factory) {
            RowInsert::Added => self.events.push(GameEvent::RowAdded),
            RowInsert::Overflow => {
                self.game_over = true;
                self.events.push(GameEvent::GameOver { score: self.score });
            }
        }
    }

    /// One second of time-mode countdown. Ignored outside time mode, while
    /// paused, or after game over. Hitting zero forces a row insertion and
    /// resets combo and clock.
    pub fn tick(&mut self) {
        if self.mode != Mode::Time || self.paused || self.game_over {
            return;
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.insert_row();
            self.combo = 1;
            self.time_left = TIME_LIMIT;
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Grid from (value, row, col) triples; ids are assigned in order.
    fn grid_from(cells: &[(u8, usize, usize)]) -> (Grid, Vec<BlockId>) {
        let blocks: Vec<Block> = cells
            .iter()
            .enumerate()
            .map(|(i, &(value, row, col))| Block {
                id: BlockId(1000 + i as u32),
                value,
                row,
                col,
            })
            .collect();
        let ids = blocks.iter().map(|b| b.id).collect();
        (Grid { blocks }, ids)
    }

    fn state_with(
        mode: Mode,
        cells: &[(u8, usize, usize)],
        target: u32,
    ) -> (GameState, Vec<BlockId>) {
        let (grid, ids) = grid_from(cells);
        let state = GameState {
            grid,
            target,
            selected: Vec::new(),
            score: 0,
            combo: 1,
            mode,
            time_left: TIME_LIMIT,
            game_over: false,
            paused: false,
            factory: BlockFactory::seeded(7),
            events: Vec::new(),
        };
        (state, ids)
    }

    fn assert_no_shared_cell(grid: &Grid) {
        let mut seen = HashSet::new();
        for b in grid.blocks() {
            assert!(
                b.row < GRID_ROWS && b.col < GRID_COLS,
                "{:?} out of lattice",
                b
            );
            assert!(
                seen.insert((b.row, b.col)),
                "two blocks at {:?}",
                (b.row, b.col)
            );
        }
    }

    #[test]
    fn initial_grid_fills_bottom_rows() {
        let mut factory = BlockFactory::seeded(1);
        let grid = Grid::initial(&mut factory);
        assert_eq!(grid.len(), INITIAL_ROWS * GRID_COLS);
        for row in (GRID_ROWS - INITIAL_ROWS)..GRID_ROWS {
            for col in 0..GRID_COLS {
                let b = grid.at(row, col).expect("bottom rows are full");
                assert!((1..=MAX_VALUE).contains(&b.value));
            }
        }
        for row in 0..(GRID_ROWS - INITIAL_ROWS) {
            for col in 0..GRID_COLS {
                assert!(grid.at(row, col).is_none());
            }
        }
        assert_no_shared_cell(&grid);
    }

    #[test]
    fn factory_ids_are_unique() {
        let mut factory = BlockFactory::seeded(2);
        let mut ids = HashSet::new();
        for i in 0..500 {
            let b = factory.create_block(i % GRID_ROWS, i % GRID_COLS);
            assert!(ids.insert(b.id));
        }
    }

    #[test]
    fn add_new_row_shifts_up_and_fills_bottom() {
        let mut factory = BlockFactory::seeded(3);
        let mut grid = Grid::initial(&mut factory);
        let shifted: Vec<(BlockId, usize)> =
            grid.blocks().iter().map(|b| (b.id, b.row - 1)).collect();
        assert_eq!(grid.add_new_row(&mut factory), RowInsert::Added);
        for (id, expect_row) in shifted {
            assert_eq!(grid.get(id).unwrap().row, expect_row);
        }
        for col in 0..GRID_COLS {
            assert!(grid.at(GRID_ROWS - 1, col).is_some());
        }
        assert_eq!(grid.len(), (INITIAL_ROWS + 1) * GRID_COLS);
        assert_no_shared_cell(&grid);
    }

    #[test]
    fn add_new_row_overflows_when_top_occupied() {
        let (mut grid, _) = grid_from(&[(5, 0, 3), (4, 9, 0)]);
        let before: Vec<Block> = grid.blocks().to_vec();
        let mut factory = BlockFactory::seeded(4);
        assert_eq!(grid.add_new_row(&mut factory), RowInsert::Overflow);
        assert_eq!(grid.blocks(), &before[..]);
    }

    #[test]
    fn compaction_settles_column_preserving_order() {
        // Column 2 holds blocks at rows 5, 7, 9 (top to bottom); clear row 7.
        let (mut grid, ids) = grid_from(&[(1, 5, 2), (2, 7, 2), (3, 9, 2)]);
        grid.clear_and_compact(&[ids[1]]);
        assert_eq!(grid.len(), 2);
        let top = grid.at(8, 2).expect("upper survivor settles to row 8");
        let bottom = grid.at(9, 2).expect("lower survivor stays at row 9");
        assert_eq!(top.id, ids[0]);
        assert_eq!(bottom.id, ids[2]);
        assert_no_shared_cell(&grid);
    }

    #[test]
    fn compaction_leaves_other_columns_alone() {
        let (mut grid, ids) = grid_from(&[(1, 4, 1), (2, 9, 1), (3, 6, 5)]);
        grid.clear_and_compact(&[ids[2]]);
        assert_eq!(grid.get(ids[0]).unwrap().row, 8);
        assert_eq!(grid.get(ids[1]).unwrap().row, 9);
    }

    #[test]
    fn target_is_reachable_by_some_small_subset() {
        let mut factory = BlockFactory::seeded(5);
        let grid = Grid::initial(&mut factory);
        for _ in 0..50 {
            let target = generate_target(&grid, &mut factory.rng);
            let values: Vec<u32> = grid.blocks().iter().map(|b| u32::from(b.value)).collect();
            let n = values.len();
            let mut found = false;
            'search: for i in 0..n {
                for j in (i + 1)..n {
                    if values[i] + values[j] == target {
                        found = true;
                        break 'search;
                    }
                    for k in (j + 1)..n {
                        if values[i] + values[j] + values[k] == target {
                            found = true;
                            break 'search;
                        }
                        for l in (k + 1)..n {
                            if values[i] + values[j] + values[k] + values[l] == target {
                                found = true;
                                break 'search;
                            }
                        }
                    }
                }
            }
            assert!(found, "target {} not reachable with 2-4 blocks", target);
        }
    }

    #[test]
    fn target_falls_back_on_empty_grid() {
        let grid = Grid::default();
        let mut rng = SmallRng::seed_from_u64(6);
        assert_eq!(generate_target(&grid, &mut rng), 10);
    }

    #[test]
    fn target_sample_clamps_to_tiny_grids() {
        let (grid, _) = grid_from(&[(7, 9, 0)]);
        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..20 {
            assert_eq!(generate_target(&grid, &mut rng), 7);
        }
    }

    #[test]
    fn success_awards_points_and_clears_blocks() {
        let (mut state, ids) =
            state_with(Mode::Time, &[(3, 9, 0), (4, 9, 1), (2, 9, 2), (5, 9, 3)], 9);
        state.toggle_select(ids[0]);
        state.toggle_select(ids[1]);
        state.toggle_select(ids[2]);
        assert_eq!(state.score, 9 * 3);
        assert!(state.selected.is_empty());
        for &id in &ids[..3] {
            assert!(state.grid.get(id).is_none());
        }
        assert!(state.grid.get(ids[3]).is_some());
        let events = state.take_events();
        match &events[0] {
            GameEvent::BlocksCleared {
                blocks,
                points,
                combo,
            } => {
                assert_eq!(blocks.len(), 3);
                assert_eq!(*points, 27);
                assert_eq!(*combo, 1);
            }
            other => panic!("expected BlocksCleared, got {:?}", other),
        }
    }

    #[test]
    fn success_in_time_mode_resets_clock_and_grows_combo() {
        let (mut state, ids) = state_with(Mode::Time, &[(4, 9, 0), (5, 9, 1), (6, 9, 2)], 9);
        state.time_left = 3;
        state.toggle_select(ids[0]);
        state.toggle_select(ids[1]);
        assert_eq!(state.time_left, TIME_LIMIT);
        assert_eq!(state.combo, 2);
    }

    #[test]
    fn combo_caps_at_five() {
        let (mut state, _) = state_with(Mode::Time, &[(1, 9, 0), (1, 9, 1)], 2);
        for round in 0..7 {
            // Refill two blocks and clear them again.
            state.grid = grid_from(&[(1, 9, 0), (1, 9, 1)]).0;
            state.target = 2;
            let ids: Vec<BlockId> = state.grid.blocks().iter().map(|b| b.id).collect();
            state.toggle_select(ids[0]);
            state.toggle_select(ids[1]);
            assert!(
                state.combo <= MAX_COMBO,
                "combo {} after round {}",
                state.combo,
                round
            );
        }
        assert_eq!(state.combo, MAX_COMBO);
    }

    #[test]
    fn classic_success_inserts_a_row() {
        let (mut state, ids) = state_with(
            Mode::Classic,
            &[(3, 9, 0), (6, 9, 1), (2, 8, 0), (8, 8, 1)],
            9,
        );
        state.toggle_select(ids[0]);
        state.toggle_select(ids[1]);
        // Two cleared, full bottom row added.
        assert_eq!(state.grid.len(), 2 + GRID_COLS);
        assert_eq!(state.combo, 1);
        let events = state.take_events();
        assert!(matches!(events[0], GameEvent::BlocksCleared { .. }));
        assert!(matches!(events[1], GameEvent::RowAdded));
    }

    #[test]
    fn bust_resets_selection_and_combo() {
        let (mut state, ids) = state_with(Mode::Time, &[(7, 9, 0), (8, 9, 1), (1, 9, 2)], 9);
        state.combo = 4;
        state.toggle_select(ids[0]);
        state.toggle_select(ids[1]);
        assert!(state.selected.is_empty());
        assert_eq!(state.combo, 1);
        assert_eq!(state.score, 0);
        assert_eq!(state.grid.len(), 3);
    }

    #[test]
    fn deselecting_back_to_empty_changes_nothing() {
        let (mut state, ids) = state_with(Mode::Classic, &[(3, 9, 0), (4, 9, 1)], 9);
        state.toggle_select(ids[0]);
        state.toggle_select(ids[0]);
        assert!(state.selected.is_empty());
        assert_eq!(state.score, 0);
        assert_eq!(state.grid.len(), 2);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn zero_target_never_matches() {
        let (mut state, ids) = state_with(Mode::Classic, &[(3, 9, 0)], 0);
        state.toggle_select(ids[0]);
        // Sum 3 > 0 busts; and the empty selection afterwards must not
        // count as matching the zero target either.
        assert!(state.selected.is_empty());
        assert_eq!(state.score, 0);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn unknown_id_toggle_is_a_noop() {
        let (mut state, _) = state_with(Mode::Classic, &[(3, 9, 0)], 9);
        state.toggle_select(BlockId(424_242));
        assert!(state.selected.is_empty());
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn overflow_ends_classic_round() {
        // Column 0 is full to the top; clearing elsewhere leaves it full,
        // so the follow-up row insertion must overflow.
        let mut cells: Vec<(u8, usize, usize)> = (0..GRID_ROWS).map(|row| (9, row, 0)).collect();
        cells.push((4, 9, 1));
        cells.push((5, 9, 2));
        let (mut state, ids) = state_with(Mode::Classic, &cells, 9);
        let before_len = state.grid.len();
        state.toggle_select(ids[GRID_ROWS]);
        state.toggle_select(ids[GRID_ROWS + 1]);
        assert!(state.game_over);
        // Cleared blocks are gone but no row was inserted.
        assert_eq!(state.grid.len(), before_len - 2);
        assert!(state.grid.at(0, 0).is_some());
        let events = state.take_events();
        assert!(matches!(events[1], GameEvent::GameOver { score: 18 }));
    }

    #[test]
    fn no_mutation_after_game_over() {
        let (mut state, ids) = state_with(Mode::Time, &[(3, 9, 0), (6, 9, 1)], 9);
        state.game_over = true;
        state.toggle_select(ids[0]);
        assert!(state.selected.is_empty());
        state.tick();
        assert_eq!(state.time_left, TIME_LIMIT);
        state.insert_row();
        assert_eq!(state.grid.len(), 2);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn tick_ignored_outside_time_mode() {
        let (mut state, _) = state_with(Mode::Classic, &[(3, 9, 0)], 9);
        state.tick();
        assert_eq!(state.time_left, TIME_LIMIT);
    }

    #[test]
    fn expired_clock_forces_row_and_resets_combo() {
        let (mut state, _) = state_with(Mode::Time, &[(3, 9, 0)], 9);
        state.combo = 3;
        for _ in 0..TIME_LIMIT {
            state.tick();
        }
        assert_eq!(state.time_left, TIME_LIMIT);
        assert_eq!(state.combo, 1);
        assert_eq!(state.grid.len(), 1 + GRID_COLS);
        let events = state.take_events();
        assert!(matches!(events[0], GameEvent::RowAdded));
    }

    #[test]
    fn pause_is_idempotent_and_freezes_input() {
        let (mut state, ids) = state_with(Mode::Time, &[(3, 9, 0)], 9);
        state.pause();
        state.pause();
        assert!(state.paused);
        state.toggle_select(ids[0]);
        assert!(state.selected.is_empty());
        state.tick();
        assert_eq!(state.time_left, TIME_LIMIT);
        state.resume();
        assert!(!state.paused);
        state.toggle_select(ids[0]);
        assert_eq!(state.selected.len(), 1);
    }

    #[test]
    fn random_play_keeps_invariants() {
        let mut driver = SmallRng::seed_from_u64(99);
        let mut state = GameState::with_seed(Mode::Time, 1234);
        let mut last_score = 0;
        for step in 0..2000 {
            if driver.random_range(0..10_u32) == 0 {
                state.tick();
            } else {
                let row = driver.random_range(0..GRID_ROWS);
                let col = driver.random_range(0..GRID_COLS);
                if let Some(b) = state.grid.at(row, col) {
                    let id = b.id;
                    state.toggle_select(id);
                }
            }
            assert!(state.score >= last_score, "score dropped at step {}", step);
            last_score = state.score;
            assert!((1..=MAX_COMBO).contains(&state.combo));
            assert!(state.time_left <= TIME_LIMIT);
            assert_no_shared_cell(&state.grid);
            for &id in &state.selected {
                assert!(
                    state.grid.get(id).is_some(),
                    "stale selection at step {}",
                    step
                );
            }
            if state.game_over {
                break;
            }
        }
    }
}
