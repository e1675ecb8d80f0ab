// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A standalone BBRv3 congestion-control core for a QUIC transport.
//!
//! This crate implements only the congestion-control decision logic: given a stream of
//! acknowledgement/loss notifications and the handful of per-path inputs described in
//! [`path::PathContext`], it derives a pacing rate, a send quantum, and a congestion
//! window. Everything around it — RTT estimation, the delivery-rate estimator, ACK
//! parsing, packet scheduling, and the pacer itself — is the transport's job; this
//! crate only ever sees the already-built samples those collaborators produce.
//!
//! The entry point is [`bbr::BbrController`].

#![cfg_attr(not(feature = "std"), no_std)]

pub mod bandwidth;
pub mod bbr;
pub mod event;
pub mod path;
pub mod random;
pub mod time;

pub(crate) mod counter;
