use crate::math::Vector3;

/// Maximum number of rows a single constraint may emit per step
pub const MAX_CONSTRAINT_ROWS: usize = 32;

/// Lower force bound used for bilateral (equality) rows
pub const MIN_BOUND: f32 = -f32::MAX;

/// Upper force bound used for bilateral (equality) rows
pub const MAX_BOUND: f32 = f32::MAX;

/// One half of a constraint row: the linear and angular parts of the
/// Jacobian for a single body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jacobian {
    /// Linear part of the Jacobian (world space)
    pub linear: Vector3,

    /// Angular part of the Jacobian (world space)
    pub angular: Vector3,
}

impl Jacobian {
    /// Returns a zeroed Jacobian
    #[inline]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zero(),
            angular: Vector3::zero(),
        }
    }
}

/// A single scalar constraint row.
///
/// Each row ties one degree of freedom between the two bodies of a
/// constraint: the solver drives the relative acceleration along the row
/// toward `acceleration` while keeping the constraint force inside
/// `[min_force, max_force]`.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintRow {
    /// Jacobian half for the first body
    pub jacobian0: Jacobian,

    /// Jacobian half for the second body
    pub jacobian1: Jacobian,

    /// Desired relative acceleration along the row
    pub acceleration: f32,

    /// Lower bound on the constraint force
    pub min_force: f32,

    /// Upper bound on the constraint force
    pub max_force: f32,

    /// Row stiffness in `[0, 1]`, already remapped to the internal range
    pub stiffness: f32,

    /// Position error the acceleration stabilizes, when applicable
    pub penetration: f32,

    /// Clamped centripetal feed-forward, stashed apart from the
    /// stabilization target; the solver folds it into the row's goal
    pub centripetal: f32,

    /// Slot in the owning constraint's force array that receives the
    /// solved reaction force
    pub force_slot: usize,

    /// Whether the row carries a user motor acceleration instead of a
    /// stabilization target
    pub is_motor: bool,
}

impl ConstraintRow {
    /// Returns an inert row with bilateral force bounds
    #[inline]
    pub fn zero() -> Self {
        Self {
            jacobian0: Jacobian::zero(),
            jacobian1: Jacobian::zero(),
            acceleration: 0.0,
            min_force: MIN_BOUND,
            max_force: MAX_BOUND,
            stiffness: 0.9,
            penetration: 0.0,
            centripetal: 0.0,
            force_slot: 0,
            is_motor: false,
        }
    }
}

/// Per-step scratch a constraint fills with its rows.
///
/// The world resets the descriptor, hands it to the constraint's row
/// builder, and feeds the populated rows to the solver.
#[derive(Debug, Clone)]
pub struct RowDescriptor {
    /// Step length in seconds
    pub timestep: f32,

    /// Reciprocal of the step length
    pub inv_timestep: f32,

    /// The rows emitted so far this step
    pub rows: [ConstraintRow; MAX_CONSTRAINT_ROWS],

    /// Number of valid entries in `rows`
    pub row_count: usize,
}

impl RowDescriptor {
    /// Creates an empty descriptor for the given step length
    pub fn new(timestep: f32) -> Self {
        Self {
            timestep,
            inv_timestep: if timestep > 0.0 { 1.0 / timestep } else { 0.0 },
            rows: [ConstraintRow::zero(); MAX_CONSTRAINT_ROWS],
            row_count: 0,
        }
    }

    /// Clears the rows and resets the step length
    pub fn reset(&mut self, timestep: f32) {
        self.timestep = timestep;
        self.inv_timestep = if timestep > 0.0 { 1.0 / timestep } else { 0.0 };
        self.row_count = 0;
    }

    /// Appends a row, returning its index
    #[inline]
    pub fn push(&mut self, row: ConstraintRow) -> usize {
        debug_assert!(self.row_count < MAX_CONSTRAINT_ROWS);
        let index = self.row_count;
        self.rows[index] = row;
        self.row_count += 1;
        index
    }

    /// Returns the populated rows
    #[inline]
    pub fn active_rows(&self) -> &[ConstraintRow] {
        &self.rows[..self.row_count]
    }
}
