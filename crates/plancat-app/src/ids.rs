// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(InstrumentId);
entity_id!(AxisId);
entity_id!(PolicyId);
entity_id!(ObjectiveId);
entity_id!(ActionId);
entity_id!(InterventionId);
entity_id!(ResultId);
entity_id!(DimensionId);
entity_id!(OrgUnitId);
entity_id!(IndicatorId);
entity_id!(RelationId);
