/*
 *  lib.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  METAR flight categories, lightning and wind on an RGB LED matrix
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

pub mod classify;
pub mod config;
pub mod constants;
pub mod display;
pub mod effects;
pub mod error;
pub mod geodata;
pub mod metar;
pub mod outline;
pub mod pacer;
pub mod projection;
pub mod region;
pub mod scheduler;
pub mod transition;
pub mod vframebuf;

pub use error::MapError;
