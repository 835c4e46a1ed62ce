//! Media capability descriptions.
//!
//! A [`Caps`] value describes an acceptable media format: a named
//! [`Structure`] (or an ordered list of alternative structures) mapping
//! field names to [`Constraint`]s on codec parameters. Caps are the
//! substrate shared by the profile loader (which assembles them from
//! restriction documents) and the matcher (which tests discovered stream
//! metadata against them).
//!
//! # Constraints
//!
//! A constraint is a fixed value, a set of acceptable values, a closed
//! numeric range, or "any":
//!
//! ```rust
//! use medialens::caps::{Constraint, Value};
//!
//! let channels = Constraint::List(vec![Value::Int(1), Value::Int(2)]);
//! assert!(channels.accepts(&Value::Int(2)));
//! assert!(!channels.accepts(&Value::Int(6)));
//!
//! let width = Constraint::IntRange { min: 0, max: 4096 };
//! assert!(width.compatible(&Constraint::Fixed(Value::Int(1920))));
//! ```

use smallvec::SmallVec;
use std::fmt;

/// Structure name used when a restriction declares no `name` field.
///
/// A structure carrying this name is a placeholder pending a later
/// override (a parent restriction can donate its name during a merge).
pub const PLACEHOLDER_NAME: &str = "NULL";

// ============================================================================
// Value - dynamically typed scalar
// ============================================================================

/// An exact fraction, used for frame rates and pixel aspect ratios.
///
/// Fractions compare by value, so 30/1 == 60/2 and 24000/1001 < 24/1.
#[derive(Clone, Copy, Debug)]
pub struct Fraction {
    /// Numerator.
    pub num: i32,
    /// Denominator (always positive).
    pub den: i32,
}

impl Fraction {
    /// Create a new fraction. The denominator must be positive.
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    fn cross(&self, other: &Fraction) -> (i64, i64) {
        (
            self.num as i64 * other.den as i64,
            other.num as i64 * self.den as i64,
        )
    }
}

impl PartialEq for Fraction {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(other);
        a == b
    }
}

impl Eq for Fraction {}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let (a, b) = self.cross(other);
        a.cmp(&b)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// A typed scalar field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Integer value.
    Int(i64),
    /// Exact fraction (frame rate, pixel aspect ratio).
    Fraction(Fraction),
    /// Boolean value.
    Bool(bool),
    /// String value.
    Str(String),
}

impl Value {
    /// The caps-literal type tag for this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Fraction(_) => "fraction",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Fraction(fr) => write!(f, "{fr}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

// ============================================================================
// Constraint - acceptable values for one field
// ============================================================================

/// Acceptable values for a single caps field.
///
/// Mirrors the shapes a restriction document can declare: a single
/// `<value>`, repeated `<value>`s, or a `<range min max>`.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    /// Exact value.
    Fixed(Value),
    /// Any of the listed values.
    List(Vec<Value>),
    /// Closed integer range (inclusive on both ends).
    IntRange {
        /// Minimum acceptable value.
        min: i64,
        /// Maximum acceptable value.
        max: i64,
    },
    /// Closed fraction range (inclusive on both ends).
    FractionRange {
        /// Minimum acceptable value.
        min: Fraction,
        /// Maximum acceptable value.
        max: Fraction,
    },
    /// Any value accepted (unconstrained).
    Any,
}

impl Constraint {
    /// Check if a value satisfies this constraint.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Constraint::Fixed(v) => v == value,
            Constraint::List(vs) => vs.contains(value),
            Constraint::IntRange { min, max } => {
                matches!(value, Value::Int(i) if min <= i && i <= max)
            }
            Constraint::FractionRange { min, max } => {
                matches!(value, Value::Fraction(fr) if min <= fr && fr <= max)
            }
            Constraint::Any => true,
        }
    }

    /// Check if two constraints have at least one value in common.
    pub fn compatible(&self, other: &Constraint) -> bool {
        use Constraint::*;
        match (self, other) {
            (Any, _) | (_, Any) => true,
            (Fixed(a), Fixed(b)) => a == b,
            (Fixed(v), c) | (c, Fixed(v)) => c.accepts(v),
            (List(a), List(b)) => a.iter().any(|v| b.contains(v)),
            (List(vs), c) | (c, List(vs)) => vs.iter().any(|v| c.accepts(v)),
            (
                IntRange { min: a1, max: a2 },
                IntRange { min: b1, max: b2 },
            ) => a1.max(b1) <= a2.min(b2),
            (
                FractionRange { min: a1, max: a2 },
                FractionRange { min: b1, max: b2 },
            ) => a1.max(b1) <= a2.min(b2),
            // Mixed-type ranges cannot overlap.
            (IntRange { .. }, FractionRange { .. })
            | (FractionRange { .. }, IntRange { .. }) => false,
        }
    }

    /// Check if this constraint accepts any value.
    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, Constraint::Any)
    }

    /// Check if this constraint is a closed range.
    #[inline]
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Constraint::IntRange { .. } | Constraint::FractionRange { .. }
        )
    }
}

impl From<Value> for Constraint {
    fn from(value: Value) -> Self {
        Constraint::Fixed(value)
    }
}

impl From<Vec<Value>> for Constraint {
    fn from(values: Vec<Value>) -> Self {
        match values.len() {
            1 => Constraint::Fixed(values.into_iter().next().unwrap()),
            _ => Constraint::List(values),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Fixed(v) => write!(f, "({}) {}", v.type_name(), v),
            Constraint::List(vs) => {
                let tag = vs.first().map(Value::type_name).unwrap_or("string");
                write!(f, "({tag}) {{ ")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, " }}")
            }
            Constraint::IntRange { min, max } => write!(f, "(int) [ {min}, {max} ]"),
            Constraint::FractionRange { min, max } => {
                write!(f, "(fraction) [ {min}, {max} ]")
            }
            Constraint::Any => write!(f, "ANY"),
        }
    }
}

// ============================================================================
// Structure - a named set of field constraints
// ============================================================================

/// A named field constraint inside a structure.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Acceptable values.
    pub constraint: Constraint,
}

/// A named mapping from field names to constraints.
///
/// Field order is declaration order; lookup is linear (structures hold a
/// handful of fields at most).
#[derive(Clone, Debug, PartialEq)]
pub struct Structure {
    name: String,
    fields: Vec<Field>,
}

impl Structure {
    /// Create an empty structure with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field addition.
    pub fn with_field(mut self, name: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        self.set(name, constraint);
        self
    }

    /// The structure name (media type, or [`PLACEHOLDER_NAME`]).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the structure name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// True if the name is still the unspecified-name placeholder.
    pub fn has_placeholder_name(&self) -> bool {
        self.name == PLACEHOLDER_NAME
    }

    /// The fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Check if a field with the given name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Get the constraint for a field, if present.
    pub fn get(&self, name: &str) -> Option<&Constraint> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.constraint)
    }

    /// Set a field, replacing any existing constraint of the same name.
    pub fn set(&mut self, name: impl Into<String>, constraint: impl Into<Constraint>) {
        let name = name.into();
        let constraint = constraint.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.constraint = constraint,
            None => self.fields.push(Field { name, constraint }),
        }
    }

    /// Check whether two structures can describe at least one common format.
    ///
    /// The names must match and every field present in both must have
    /// compatible constraints. Fields present on only one side do not
    /// restrict the other.
    pub fn can_intersect(&self, other: &Structure) -> bool {
        if self.name != other.name {
            return false;
        }
        self.fields.iter().all(|f| match other.get(&f.name) {
            Some(c) => f.constraint.compatible(c),
            None => true,
        })
    }

    /// Check that every field `pattern` declares also exists here.
    ///
    /// This is a field-presence test only; value compatibility is
    /// [`can_intersect`](Self::can_intersect)'s job.
    pub fn has_all_fields_of(&self, pattern: &Structure) -> bool {
        for field in &pattern.fields {
            if !self.has_field(&field.name) {
                tracing::trace!(field = %field.name, "missing field");
                return false;
            }
        }
        true
    }

    /// Merge fields from `donor` that are missing here.
    ///
    /// Existing fields keep their constraints (this side wins on
    /// collisions). If this structure still has the placeholder name and
    /// the donor does not, the donor's name is adopted.
    pub fn merge_from(&mut self, donor: &Structure) {
        if self.has_placeholder_name() && !donor.has_placeholder_name() {
            self.name = donor.name.clone();
        }
        for field in &donor.fields {
            if !self.has_field(&field.name) {
                self.fields.push(field.clone());
            }
        }
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for field in &self.fields {
            write!(f, ", {} = {}", field.name, field.constraint)?;
        }
        Ok(())
    }
}

// ============================================================================
// Caps
// ============================================================================

/// A set of acceptable media formats.
///
/// Either unrestricted (`ANY`), empty (`EMPTY`, matches nothing), or an
/// ordered list of alternative [`Structure`]s. Almost all caps hold
/// exactly one structure, so the list is a small-vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Caps {
    any: bool,
    structures: SmallVec<[Structure; 1]>,
}

impl Caps {
    /// Unrestricted caps: compatible with everything.
    pub fn any() -> Self {
        Self {
            any: true,
            structures: SmallVec::new(),
        }
    }

    /// Empty caps: compatible with nothing. Used as the container caps of
    /// container-less (elementary-stream) profiles.
    pub fn none() -> Self {
        Self {
            any: false,
            structures: SmallVec::new(),
        }
    }

    /// Caps holding a single structure.
    pub fn new(structure: Structure) -> Self {
        let mut structures = SmallVec::new();
        structures.push(structure);
        Self {
            any: false,
            structures,
        }
    }

    /// Caps holding the given alternative structures.
    pub fn from_structures(structures: impl IntoIterator<Item = Structure>) -> Self {
        Self {
            any: false,
            structures: structures.into_iter().collect(),
        }
    }

    /// Parse a caps literal (`Caps` also implements [`std::str::FromStr`]).
    pub fn parse(literal: &str) -> crate::error::Result<Self> {
        crate::caps_parser::parse_caps(literal)
    }

    /// True if unrestricted.
    pub fn is_any(&self) -> bool {
        self.any
    }

    /// True if compatible with nothing.
    pub fn is_empty(&self) -> bool {
        !self.any && self.structures.is_empty()
    }

    /// The alternative structures (empty for `ANY` and `EMPTY`).
    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    /// The first structure, if there is one.
    pub fn first(&self) -> Option<&Structure> {
        self.structures.first()
    }

    /// Mutable access to the first structure, if there is one.
    pub fn first_mut(&mut self) -> Option<&mut Structure> {
        self.structures.first_mut()
    }

    /// Append an alternative structure.
    pub fn push(&mut self, structure: Structure) {
        self.any = false;
        self.structures.push(structure);
    }

    /// Check whether the two caps share at least one acceptable format.
    ///
    /// Empty caps intersect with nothing; `ANY` intersects with anything
    /// non-empty; otherwise some pair of structures must intersect.
    pub fn can_intersect(&self, other: &Caps) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if self.any || other.any {
            return true;
        }
        self.structures
            .iter()
            .any(|a| other.structures.iter().any(|b| a.can_intersect(b)))
    }

    /// Check that every field of `pattern`'s leading structure is also
    /// present on this caps's leading structure.
    pub fn is_subset_fields(&self, pattern: &Caps) -> bool {
        match (self.first(), pattern.first()) {
            (Some(st), Some(pat)) => st.has_all_fields_of(pat),
            // ANY declares no fields, so anything trivially covers it.
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Merge fields of `donor`'s leading structure into our leading
    /// structure: missing fields are added, existing fields are kept, and
    /// a placeholder name is replaced by the donor's name.
    ///
    /// Used when resolving `<parent>` references: the child's caps merge
    /// each parent underneath, so the child overrides inherited fields.
    pub fn merge_fields_from(&mut self, donor: &Caps) {
        let Some(donor_st) = donor.first() else {
            return;
        };
        if self.structures.is_empty() {
            if !self.any {
                self.structures.push(donor_st.clone());
            }
            return;
        }
        self.structures[0].merge_from(donor_st);
    }

    /// Flatten these caps into concrete format structures for listing.
    ///
    /// List-valued fields are exploded into one structure per value
    /// combination, range and `ANY` fields are treated as unconstrained
    /// and dropped, and placeholder or raw-format structures are skipped
    /// entirely. Used by the catalog's format-listing helpers, not by
    /// matching.
    pub fn normalize(&self) -> Vec<Structure> {
        let mut out = Vec::new();
        for st in &self.structures {
            if st.has_placeholder_name() || is_raw_format_name(st.name()) {
                continue;
            }
            let mut combos = vec![Structure::new(st.name())];
            for field in st.fields() {
                match &field.constraint {
                    Constraint::Fixed(v) => {
                        for combo in &mut combos {
                            combo.set(&field.name, Constraint::Fixed(v.clone()));
                        }
                    }
                    Constraint::List(vs) => {
                        let mut next = Vec::with_capacity(combos.len() * vs.len());
                        for combo in &combos {
                            for v in vs {
                                let mut c = combo.clone();
                                c.set(&field.name, Constraint::Fixed(v.clone()));
                                next.push(c);
                            }
                        }
                        combos = next;
                    }
                    // Ranges and ANY are unconstrained for listing purposes.
                    Constraint::IntRange { .. }
                    | Constraint::FractionRange { .. }
                    | Constraint::Any => {}
                }
            }
            for combo in combos {
                if !out.contains(&combo) {
                    out.push(combo);
                }
            }
        }
        out
    }
}

fn is_raw_format_name(name: &str) -> bool {
    name.starts_with("audio/x-raw") || name.starts_with("video/x-raw")
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.any {
            return write!(f, "ANY");
        }
        if self.structures.is_empty() {
            return write!(f, "EMPTY");
        }
        for (i, st) in self.structures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{st}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Caps {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Caps::parse(s)
    }
}
