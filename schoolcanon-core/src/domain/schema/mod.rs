// schoolcanon-core/src/domain/schema/mod.rs

pub mod canonical;
pub mod record;
pub mod value;
pub mod vocabulary;

pub use canonical::{
    CanonicalSchema, DEMOGRAPHICS, DatasetKind, EXAMS, FieldKind, FieldSpec, REGENTS,
    SOURCE_VINTAGE,
};
pub use record::{CanonicalRecord, EntityKey, RawRecord, RawTable};
pub use value::CanonicalValue;
pub use vocabulary::{ALL_GRADES, CanonicalCategory, ExamGrade, ExamSubject, Vocabulary};
