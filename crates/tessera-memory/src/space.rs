//! Memory spaces and their accessibility rules

use crate::error::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tessera_abi::space_code;

/// A named memory domain with its own allocator
///
/// Pinned (`CudaHost`) and managed (`CudaManaged`) memory are reachable from
/// both the host and the device; plain device memory (`Cuda`) is not
/// host-accessible and can only be read back through a transfer primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Space {
    /// Pageable host RAM
    #[default]
    System,
    /// Accelerator device memory
    Cuda,
    /// Page-locked host memory visible to the accelerator
    CudaHost,
    /// Unified memory migrated on demand
    CudaManaged,
}

impl Space {
    /// All spaces, in ABI code order
    pub const ALL: [Space; 4] = [Space::System, Space::Cuda, Space::CudaHost, Space::CudaManaged];

    /// Canonical lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            Space::System => "system",
            Space::Cuda => "cuda",
            Space::CudaHost => "cuda_host",
            Space::CudaManaged => "cuda_managed",
        }
    }

    /// Native ABI space code
    pub const fn code(self) -> i32 {
        match self {
            Space::System => space_code::SYSTEM,
            Space::Cuda => space_code::CUDA,
            Space::CudaHost => space_code::CUDA_HOST,
            Space::CudaManaged => space_code::CUDA_MANAGED,
        }
    }

    /// Decode a native ABI space code
    pub const fn from_code(code: i32) -> Option<Space> {
        match code {
            space_code::SYSTEM => Some(Space::System),
            space_code::CUDA => Some(Space::Cuda),
            space_code::CUDA_HOST => Some(Space::CudaHost),
            space_code::CUDA_MANAGED => Some(Space::CudaManaged),
            _ => None,
        }
    }

    /// Whether host code may dereference pointers into this space
    pub const fn is_host_accessible(self) -> bool {
        matches!(self, Space::System | Space::CudaHost | Space::CudaManaged)
    }

    /// Whether device code may dereference pointers into this space
    pub const fn is_device_accessible(self) -> bool {
        matches!(self, Space::Cuda | Space::CudaHost | Space::CudaManaged)
    }

    /// Whether memory in `self` can be reached by code running in `from`
    pub const fn accessible_from(self, from: Space) -> bool {
        match from {
            Space::System => self.is_host_accessible(),
            Space::Cuda => self.is_device_accessible(),
            // Pinned and managed contexts see everything their host and
            // device halves see.
            Space::CudaHost | Space::CudaManaged => true,
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Space {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Space::System),
            "cuda" => Ok(Space::Cuda),
            "cuda_host" => Ok(Space::CudaHost),
            "cuda_managed" => Ok(Space::CudaManaged),
            other => Err(MemoryError::UnknownSpace(other.to_string())),
        }
    }
}

/// True iff `space` is reachable from at least one of `candidates`
pub fn accessible(space: Space, candidates: &[Space]) -> bool {
    candidates.iter().any(|&from| space.accessible_from(from))
}
