/*
 * SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

#[allow(non_snake_case, unknown_lints, clippy::all)]
#[rustfmt::skip]
pub mod common {
    include!(concat!(env!("OUT_DIR"), "/common.rs"));
}

#[allow(non_snake_case, unknown_lints, clippy::all)]
#[rustfmt::skip]
pub mod psm {
    include!(concat!(env!("OUT_DIR"), "/psm.rs"));
}

#[allow(non_snake_case, unknown_lints, clippy::all)]
#[rustfmt::skip]
pub mod rla {
    include!(concat!(env!("OUT_DIR"), "/rla.rs"));
}

#[allow(non_snake_case, unknown_lints, clippy::all)]
#[rustfmt::skip]
pub mod site {
    include!(concat!(env!("OUT_DIR"), "/site.rs"));
}
