// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A saturating counter.
//!
//! Rather than silently wrapping on overflow (or panicking and handing the caller a
//! failure mode the controller's error-handling design explicitly rules out), counters
//! in the hot ACK/loss path always saturate at the representable bound. This is a
//! deliberately simplified counterpart of the `checked-counters`-style debug-panic
//! behavior found elsewhere in this lineage: the controller's contract is that it never
//! panics on caller-supplied data, so the checked/saturating split isn't reproduced here.

use core::{cmp::Ordering, ops};

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct Counter<T>(T);

macro_rules! impl_counter {
    ($ty:ty) => {
        impl Counter<$ty> {
            pub const fn new(value: $ty) -> Self {
                Self(value)
            }

            pub fn set(&mut self, value: $ty) {
                self.0 = value;
            }

            pub fn try_add(&mut self, value: impl TryInto<$ty>) -> Result<(), &'static str> {
                let value = value.try_into().map_err(|_| "value out of range")?;
                *self += value;
                Ok(())
            }

            pub fn try_sub(&mut self, value: impl TryInto<$ty>) -> Result<(), &'static str> {
                let value = value.try_into().map_err(|_| "value out of range")?;
                *self -= value;
                Ok(())
            }
        }

        impl ops::AddAssign<$ty> for Counter<$ty> {
            fn add_assign(&mut self, rhs: $ty) {
                self.0 = self.0.saturating_add(rhs);
            }
        }

        impl ops::SubAssign<$ty> for Counter<$ty> {
            fn sub_assign(&mut self, rhs: $ty) {
                self.0 = self.0.saturating_sub(rhs);
            }
        }

        impl ops::Deref for Counter<$ty> {
            type Target = $ty;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl PartialEq<$ty> for Counter<$ty> {
            fn eq(&self, other: &$ty) -> bool {
                self.0 == *other
            }
        }

        impl PartialOrd<$ty> for Counter<$ty> {
            fn partial_cmp(&self, other: &$ty) -> Option<Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl From<Counter<$ty>> for $ty {
            fn from(value: Counter<$ty>) -> Self {
                value.0
            }
        }
    };
}

impl_counter!(u32);
impl_counter!(u64);
