use redb::TypeName;
pub use v2 as latest_value;

pub mod v1;
pub mod v2;

pub trait ValueVariant {
    const VERSION: u8;
}

#[derive(Debug, Clone)]
pub enum VersionedValue {
    V1(v1::Value),
    V2(v2::Value),
}

impl VersionedValue {
    /// Stored version number of this value.
    pub fn version(&self) -> u8 {
        match self {
            VersionedValue::V1(_) => v1::Value::VERSION,
            VersionedValue::V2(_) => v2::Value::VERSION,
        }
    }

    /// Upgrades to the latest shape, backfilling fields older versions lack.
    pub fn into_latest(self) -> latest_value::Value {
        match self {
            VersionedValue::V1(v) => latest_value::Value {
                content: v.content,
                updated_at: v.updated_at,
                deleted_at: v.deleted_at,
                attachments: vec![],
            },
            VersionedValue::V2(v) => v,
        }
    }
}

impl From<latest_value::Value> for VersionedValue {
    fn from(value: latest_value::Value) -> Self {
        VersionedValue::V2(value)
    }
}

impl redb::Value for VersionedValue {
    type SelfType<'a> = VersionedValue;
    type AsBytes<'a> = Vec<u8>;

    fn fixed_width() -> Option<usize> {
        None
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        let (version, data) = data.split_first().expect("empty data");
        match *version {
            v1::Value::VERSION => {
                VersionedValue::V1(postcard::from_bytes(data).expect("invalid v1 value"))
            }
            v2::Value::VERSION => {
                VersionedValue::V2(postcard::from_bytes(data).expect("invalid v2 value"))
            }
            version => panic!("unsupported version: {}", version),
        }
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
    where
        Self: 'b,
    {
        match value {
            VersionedValue::V1(v1) => postcard::to_extend(v1, vec![v1::Value::VERSION]).unwrap(),
            VersionedValue::V2(v2) => postcard::to_extend(v2, vec![v2::Value::VERSION]).unwrap(),
        }
    }

    fn type_name() -> TypeName {
        TypeName::new("t3vo::Record")
    }
}
