// SPDX-License-Identifier: GPL-3.0-only

//! Image source backends: live camera and still files

pub mod camera;
pub mod still_image;
