// schoolcanon-core/src/domain/vintage/mod.rs

pub mod compiled;
pub mod descriptor;
pub mod registry;

pub use compiled::{CompiledRule, CompiledVintage};
pub use descriptor::{
    AcademicYearRule, AdapterKind, AuxiliaryField, AuxiliaryKind, ColumnRule, CrosswalkSpec,
    DerivedField, PopulationScope, SourceFormat, SourceSpec, VintageDescriptor, YearRange,
};
pub use registry::VintageRegistry;
