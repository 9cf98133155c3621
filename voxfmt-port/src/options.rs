/// Choices affecting how files are loaded.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct LoadOptions {
    /// For formats with nested node hierarchies (Qubicle `.qbt` and `.qbcl` compounds),
    /// flatten each compound and its children into a single model node instead of
    /// keeping the children as separate nodes. The children's own offsets are applied
    /// relative to the compound when flattening.
    pub merge_compounds: bool,
}

impl LoadOptions {
    /// Sets [`LoadOptions::merge_compounds`].
    #[must_use]
    pub fn with_merge_compounds(mut self, merge_compounds: bool) -> Self {
        self.merge_compounds = merge_compounds;
        self
    }
}

/// Choices affecting how files are saved.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct SaveOptions {
    /// Coordinate handedness written to Qubicle `.qb` files.
    pub qb_handedness: Handedness,
}

impl SaveOptions {
    /// Sets [`SaveOptions::qb_handedness`].
    #[must_use]
    pub fn with_qb_handedness(mut self, handedness: Handedness) -> Self {
        self.qb_handedness = handedness;
        self
    }
}

/// Axis convention of a file format which supports both.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Handedness {
    /// X and Z are stored in file order.
    #[default]
    Left,
    /// X and Z are swapped relative to the file.
    Right,
}
