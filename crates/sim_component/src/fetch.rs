//! Typed fetch for manager iteration.
//!
//! [`QueryData`] is implemented for tuples of one to four component types, so
//! `ecm.each::<(Pose, LinearVelocity)>(..)` both selects the matching
//! entities and hands the callback owned copies of their values.

use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;
use crate::manager::EntityComponentManager;

/// A set of component types fetched together for one entity.
pub trait QueryData: Sized {
    /// The component types an entity must carry to match.
    fn type_ids() -> Vec<ComponentTypeId>;

    /// Fetch the values for `entity`, or `None` if any is missing.
    fn fetch(ecm: &EntityComponentManager, entity: Entity) -> Option<Self>;
}

macro_rules! impl_query_data {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> QueryData for ($($ty,)+) {
            fn type_ids() -> Vec<ComponentTypeId> {
                vec![$($ty::component_type_id()),+]
            }

            fn fetch(ecm: &EntityComponentManager, entity: Entity) -> Option<Self> {
                Some(($(ecm.component::<$ty>(entity)?,)+))
            }
        }
    };
}

impl_query_data!(A);
impl_query_data!(A, B);
impl_query_data!(A, B, C);
impl_query_data!(A, B, C, D);
