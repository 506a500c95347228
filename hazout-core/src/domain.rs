//! Closed enumerations of the hazard model and the typed result data type.
//!
//! Every bucket key is classified against three enumerations: intensity
//! measure types ([`Imt`]), earthquake source types ([`SourceType`]) and
//! ground motion models ([`Gmm`]). Membership is a case-sensitive lookup
//! against the variant names, which are also the directory names written by
//! the hazard program.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{IndexError, Result};

/// Returned when a string names no member of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{value} is not a member of {enumeration}")]
pub struct UnknownMember {
    pub enumeration: &'static str,
    pub value: String,
}

macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Exact, case-sensitive membership lookup.
            pub fn lookup(value: &str) -> Option<Self> {
                match value {
                    $(stringify!($variant) => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::domain::UnknownMember;

            fn from_str(value: &str) -> ::std::result::Result<Self, Self::Err> {
                $name::lookup(value).ok_or_else(|| $crate::domain::UnknownMember {
                    enumeration: stringify!($name),
                    value: value.to_string(),
                })
            }
        }
    };
}

pub(crate) use closed_enum;

closed_enum! {
    /// Intensity measure type.
    Imt {
        PGA, PGV, PGD,
        SA0P01, SA0P02, SA0P03, SA0P05, SA0P075,
        SA0P1, SA0P15, SA0P2, SA0P25, SA0P3, SA0P4, SA0P5, SA0P75,
        SA1P0, SA1P5, SA2P0, SA3P0, SA4P0, SA5P0, SA7P5, SA10P0,
    }
}

closed_enum! {
    /// Earthquake source type.
    SourceType {
        AREA, CLUSTER, FAULT, GRID, INTERFACE, SLAB, SYSTEM,
    }
}

closed_enum! {
    /// Ground motion model.
    Gmm {
        ASK_14, ASK_14_BASIN, BSSA_14, BSSA_14_BASIN, CB_14, CB_14_BASIN, CY_14, CY_14_BASIN,
        IDRISS_14, GK_15,
        AB_03_GLOBAL_INTERFACE, AB_03_GLOBAL_SLAB, AB_03_CASCADIA_INTERFACE, AB_03_CASCADIA_SLAB,
        AM_09_INTERFACE, AM_09_INTERFACE_BASIN, BCHYDRO_12_INTERFACE, BCHYDRO_12_SLAB,
        ZHAO_06_INTERFACE, ZHAO_06_SLAB,
        AB_06_PRIME, ATKINSON_08_PRIME, CAMPBELL_03, FRANKEL_96, PEZESHK_11, SILVA_02,
        SOMERVILLE_01, TORO_97_MW, TP_05, NGA_EAST_USGS, NGA_EAST_SEED_USGS,
        BA_08, CB_08, CY_08, AS_08,
    }
}

/// Kind of result stored under a run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Total,
    Source,
    Gmm,
}

/// The classified data type of a single map file, tagged by kind.
///
/// Serializes as `{"imt", "type", "sourceType"}` where `sourceType` carries
/// the qualifier of the kind (the IMT itself for totals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardDataType {
    Total(Imt),
    Source(SourceType, Imt),
    Gmm(Gmm, Imt),
}

impl HazardDataType {
    pub fn imt(&self) -> Imt {
        match self {
            HazardDataType::Total(imt)
            | HazardDataType::Source(_, imt)
            | HazardDataType::Gmm(_, imt) => *imt,
        }
    }

    pub fn kind(&self) -> DataType {
        match self {
            HazardDataType::Total(_) => DataType::Total,
            HazardDataType::Source(..) => DataType::Source,
            HazardDataType::Gmm(..) => DataType::Gmm,
        }
    }

    /// The classifier segment value, typed by kind.
    pub fn qualifier(&self) -> &'static str {
        match self {
            HazardDataType::Total(imt) => imt.as_str(),
            HazardDataType::Source(source, _) => source.as_str(),
            HazardDataType::Gmm(gmm, _) => gmm.as_str(),
        }
    }
}

#[derive(Serialize)]
struct DataTypeJson {
    imt: Imt,
    #[serde(rename = "type")]
    kind: DataType,
    #[serde(rename = "sourceType")]
    source_type: &'static str,
}

impl Serialize for HazardDataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        DataTypeJson {
            imt: self.imt(),
            kind: self.kind(),
            source_type: self.qualifier(),
        }
        .serialize(serializer)
    }
}

/// Checks that no name belongs to more than one of the three classifier
/// enumerations. The result is computed once per process.
pub fn ensure_disjoint() -> Result<()> {
    static DISJOINT: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    DISJOINT
        .get_or_init(|| {
            let mut seen: HashSet<&'static str> = HashSet::new();
            let names = SourceType::ALL
                .iter()
                .map(|s| s.as_str())
                .chain(Gmm::ALL.iter().map(|g| g.as_str()))
                .chain(Imt::ALL.iter().map(|i| i.as_str()));
            for name in names {
                if !seen.insert(name) {
                    tracing::error!(name, "Classifier enumerations overlap");
                    return Err(format!("classifier enumerations overlap on [{name}]"));
                }
            }
            Ok(())
        })
        .clone()
        .map_err(IndexError::internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerations_are_disjoint() {
        assert!(ensure_disjoint().is_ok());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(Imt::lookup("PGA"), Some(Imt::PGA));
        assert_eq!(Imt::lookup("pga"), None);
        assert_eq!(SourceType::lookup("FAULT"), Some(SourceType::FAULT));
        assert_eq!(Gmm::lookup("ASK_14"), Some(Gmm::ASK_14));
        assert_eq!(Gmm::lookup("ask_14"), None);
    }

    #[test]
    fn from_str_names_the_enumeration() {
        let err = "BOGUS".parse::<SourceType>().unwrap_err();
        assert_eq!(err.enumeration, "SourceType");
        assert_eq!(err.to_string(), "BOGUS is not a member of SourceType");
    }

    #[test]
    fn data_type_serializes_with_qualifier() {
        let json = serde_json::to_value(HazardDataType::Gmm(Gmm::ASK_14, Imt::SA1P0)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"imt": "SA1P0", "type": "GMM", "sourceType": "ASK_14"})
        );

        let json = serde_json::to_value(HazardDataType::Total(Imt::PGA)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"imt": "PGA", "type": "TOTAL", "sourceType": "PGA"})
        );
    }
}
