use super::{Geometry, Site};
use crate::error::ConfigurationError;
use color_eyre::eyre::eyre;
use config::{Config, File};
use nalgebra::Point3;
use serde::{de::DeserializeOwned, Deserialize};
use std::{collections::BTreeMap, path::PathBuf};
use transporter_mesher::{Cell, GridScalar};

/// The on-disk description of a device: the lattice, the atomic sites and the electrode
/// potentials
///
/// ```toml
/// cell = [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 30.0]]
///
/// [[sites]]
/// position = [5.0, 5.0, 1.0]
/// tag = "Au"
/// group = "Left"
///
/// [[potentials]]
/// group = "Left"
/// value = -0.5
/// ```
#[derive(Debug, Deserialize)]
pub struct Device<T> {
    pub(crate) cell: [[T; 3]; 3],
    pub(crate) sites: Vec<SiteRecord<T>>,
    #[serde(default = "Vec::new")]
    pub(crate) potentials: Vec<PotentialRecord<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SiteRecord<T> {
    pub(crate) position: [T; 3],
    #[serde(default)]
    pub(crate) tag: String,
    pub(crate) group: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PotentialRecord<T> {
    pub(crate) group: String,
    pub(crate) value: T,
}

impl<T: DeserializeOwned> Device<T> {
    pub fn build(path: PathBuf) -> color_eyre::Result<Self> {
        let s = Config::builder().add_source(File::from(path)).build()?;
        s.try_deserialize()
            .map_err(|e| eyre!("Failed to deserialize device: {:?}", e))
    }
}

impl<T: GridScalar> Device<T> {
    /// Splits the description into the geometry and the electrode potential map
    pub fn into_geometry(
        self,
    ) -> Result<(Geometry<T>, BTreeMap<String, T>), ConfigurationError> {
        let cell = Cell::from_rows(&self.cell)?;
        let sites = self
            .sites
            .into_iter()
            .map(|record| Site {
                position: Point3::from(record.position),
                tag: record.tag,
                group: record.group,
            })
            .collect();

        let mut potentials = BTreeMap::new();
        for record in self.potentials {
            if potentials.insert(record.group.clone(), record.value).is_some() {
                return Err(ConfigurationError::DuplicatePotential(record.group));
            }
        }
        Ok((Geometry::new(cell, sites), potentials))
    }
}

#[cfg(test)]
mod test {
    use super::Device;
    use crate::error::ConfigurationError;
    use approx::assert_relative_eq;
    use config::{Config, File, FileFormat};
    use nalgebra::Point3;

    const DEVICE: &str = r#"
        cell = [[10.0, 0.0, 0.0], [0.0, 12.0, 0.0], [0.0, 0.0, 30.0]]

        [[sites]]
        position = [5.0, 6.0, 1.0]
        tag = "Au"
        group = "Left"

        [[sites]]
        position = [5.0, 6.0, 15.0]
        tag = "C"
        group = "Device"

        [[sites]]
        position = [5.0, 6.0, 29.0]
        tag = "Au"
        group = "Right"

        [[potentials]]
        group = "Left"
        value = -0.25

        [[potentials]]
        group = "Right"
        value = 0.25
    "#;

    fn parse(source: &str) -> Device<f64> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn device_file_yields_geometry_and_potentials() {
        let (geometry, potentials) = parse(DEVICE).into_geometry().unwrap();
        assert_relative_eq!(geometry.cell().length(1), 12.0);
        assert_eq!(geometry.sites().len(), 3);
        assert_eq!(geometry.sites()[2].position, Point3::new(5.0, 6.0, 29.0));
        assert_eq!(geometry.electrode_names(), vec!["Left", "Right"]);
        assert_eq!(potentials["Right"], 0.25);
    }

    #[test]
    fn repeated_potentials_are_rejected() {
        let source = format!("{DEVICE}\n[[potentials]]\ngroup = \"Left\"\nvalue = 1.0\n");
        assert_eq!(
            parse(&source).into_geometry().unwrap_err(),
            ConfigurationError::DuplicatePotential("Left".into())
        );
    }
}
