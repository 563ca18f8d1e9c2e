//! Controls the deserialization and storage of the atomic geometry, and the construction of the
//! fixed-potential electrodes from its named groups

/// The deserialization of the device description
pub(crate) mod reader;

pub use reader::Device;

use crate::error::ConfigurationError;
use itertools::Itertools;
use nalgebra::Point3;
use std::collections::BTreeMap;
use transporter_mesher::{Cell, GridScalar};

/// Groups which hold atoms but never act as electrodes
const RESERVED_GROUPS: [&str; 2] = ["Buffer", "Device"];

/// Whether the group `name` describes an electrode
///
/// Groups named `Buffer` or `Device`, and any group whose name contains a `+`, are not electrodes.
pub fn is_electrode_group(name: &str) -> bool {
    !(name.contains('+') || RESERVED_GROUPS.contains(&name))
}

#[derive(Clone, Debug, PartialEq)]
/// A single atomic site
pub struct Site<T: GridScalar> {
    pub position: Point3<T>,
    /// The species label of the site
    pub tag: String,
    /// The named group the site belongs to
    pub group: String,
}

#[derive(Clone, Debug, PartialEq)]
/// An ordered collection of sites inside a lattice cell
pub struct Geometry<T: GridScalar> {
    cell: Cell<T>,
    sites: Vec<Site<T>>,
}

impl<T: GridScalar> Geometry<T> {
    pub fn new(cell: Cell<T>, sites: Vec<Site<T>>) -> Self {
        Self { cell, sites }
    }

    pub fn cell(&self) -> &Cell<T> {
        &self.cell
    }

    pub fn sites(&self) -> &[Site<T>] {
        &self.sites
    }

    /// Group names in order of their first appearance in the site list
    pub fn group_names(&self) -> Vec<&str> {
        self.sites
            .iter()
            .map(|site| site.group.as_str())
            .unique()
            .collect()
    }

    /// The indices of every site in `group`, in site order
    pub fn group_indices(&self, group: &str) -> Vec<usize> {
        self.sites
            .iter()
            .positions(|site| site.group == group)
            .collect()
    }

    pub fn electrode_names(&self) -> Vec<&str> {
        self.group_names()
            .into_iter()
            .filter(|name| is_electrode_group(name))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
/// A set of sites held at a fixed potential
pub struct Electrode<T: GridScalar> {
    name: String,
    positions: Vec<Point3<T>>,
    potential: T,
}

impl<T: GridScalar> Electrode<T> {
    pub fn new(
        name: impl Into<String>,
        positions: Vec<Point3<T>>,
        potential: T,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if positions.is_empty() {
            return Err(ConfigurationError::EmptyElectrode(name));
        }
        Ok(Self {
            name,
            positions,
            potential,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn positions(&self) -> &[Point3<T>] {
        &self.positions
    }

    pub fn potential(&self) -> T {
        self.potential
    }
}

/// Pairs every electrode group in `geometry` with its potential
///
/// Electrodes are returned in the order their groups first appear in the geometry, which is
/// the order in which their constraints are later applied. Every electrode must have exactly
/// one potential and every potential must belong to an electrode.
#[tracing::instrument(name = "Electrode construction", level = "info", skip_all)]
pub fn build_electrodes<T: GridScalar>(
    geometry: &Geometry<T>,
    potentials: &BTreeMap<String, T>,
) -> Result<Vec<Electrode<T>>, ConfigurationError> {
    let names = geometry.electrode_names();
    if names.is_empty() {
        return Err(ConfigurationError::NoElectrodes);
    }

    let missing: Vec<String> = names
        .iter()
        .filter(|name| !potentials.contains_key(**name))
        .map(|name| name.to_string())
        .sorted()
        .collect();
    if !missing.is_empty() {
        return Err(ConfigurationError::MissingPotentials(missing));
    }
    // BTreeMap keys are already sorted
    let extra: Vec<String> = potentials
        .keys()
        .filter(|key| !names.contains(&key.as_str()))
        .cloned()
        .collect();
    if !extra.is_empty() {
        return Err(ConfigurationError::ExtraPotentials(extra));
    }

    names
        .into_iter()
        .map(|name| {
            let positions = geometry
                .group_indices(name)
                .into_iter()
                .map(|index| geometry.sites[index].position)
                .collect();
            tracing::trace!("Electrode {name} held at {}", potentials[name]);
            Electrode::new(name, positions, potentials[name])
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::{build_electrodes, is_electrode_group, Electrode, Geometry, Site};
    use crate::error::ConfigurationError;
    use nalgebra::Point3;
    use std::collections::BTreeMap;
    use transporter_mesher::Cell;

    fn geometry(groups: &[&str]) -> Geometry<f64> {
        let sites = groups
            .iter()
            .enumerate()
            .map(|(i, group)| Site {
                position: Point3::new(i as f64, 0., 0.),
                tag: "C".into(),
                group: group.to_string(),
            })
            .collect();
        Geometry::new(Cell::orthorhombic([10., 10., 10.]).unwrap(), sites)
    }

    fn potentials(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    #[test]
    fn reserved_and_compound_groups_are_not_electrodes() {
        assert!(!is_electrode_group("Device"));
        assert!(!is_electrode_group("Buffer"));
        assert!(!is_electrode_group("Left+Right"));
        assert!(is_electrode_group("Left"));
        assert!(is_electrode_group("device"));
    }

    #[test]
    fn electrodes_follow_the_geometry_order() {
        let geometry = geometry(&["Right", "Device", "Left", "Right", "Buffer", "Left"]);
        let electrodes =
            build_electrodes(&geometry, &potentials(&[("Left", -0.5), ("Right", 0.5)])).unwrap();
        assert_eq!(electrodes.len(), 2);
        assert_eq!(electrodes[0].name(), "Right");
        assert_eq!(
            electrodes[0].positions(),
            &[Point3::new(0., 0., 0.), Point3::new(3., 0., 0.)]
        );
        assert_eq!(electrodes[1].name(), "Left");
        assert_eq!(electrodes[1].potential(), -0.5);
    }

    #[test]
    fn missing_potentials_are_listed_in_sorted_order() {
        let geometry = geometry(&["Top", "Bottom", "Gate"]);
        let result = build_electrodes(&geometry, &potentials(&[("Gate", 1.0)]));
        assert_eq!(
            result,
            Err(ConfigurationError::MissingPotentials(vec![
                "Bottom".into(),
                "Top".into()
            ]))
        );
    }

    #[test]
    fn potentials_for_unknown_groups_are_rejected() {
        let geometry = geometry(&["Left", "Device"]);
        let result = build_electrodes(
            &geometry,
            &potentials(&[("Left", 0.0), ("Device", 1.0), ("Ghost", 2.0)]),
        );
        assert_eq!(
            result,
            Err(ConfigurationError::ExtraPotentials(vec![
                "Device".into(),
                "Ghost".into()
            ]))
        );
    }

    #[test]
    fn a_geometry_without_electrodes_is_rejected() {
        let geometry = geometry(&["Device", "Buffer", "A+B"]);
        assert_eq!(
            build_electrodes(&geometry, &BTreeMap::new()),
            Err(ConfigurationError::NoElectrodes)
        );
    }

    #[test]
    fn an_electrode_needs_at_least_one_site() {
        assert_eq!(
            Electrode::<f64>::new("Gate", vec![], 1.0),
            Err(ConfigurationError::EmptyElectrode("Gate".into()))
        );
    }
}
