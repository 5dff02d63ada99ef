// Extension gating
//
// Nothing is enabled unless it appears in the list enumerated beforehand.
// Enabling an unadvertised extension would leave its function pointers null,
// so it is a hard failure here rather than a validation-layer message later.

use std::ffi::{c_char, CStr};

use ash::vk;
use renderplug::DriverError;

/// Names out of enumerated extension properties.
pub fn extension_names(properties: &[vk::ExtensionProperties]) -> Vec<String> {
    properties
        .iter()
        .map(|p| fixed_c_str(&p.extension_name))
        .collect()
}

/// Reads a nul-terminated name out of a fixed-size Vulkan char array.
pub fn fixed_c_str(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn is_supported(supported: &[String], name: &CStr) -> bool {
    let name = name.to_string_lossy();
    supported.iter().any(|s| *s == name)
}

/// Builds the list to enable: every `required` name must be supported,
/// `optional` names are kept only when supported.
pub fn gate_extensions(
    supported: &[String],
    required: &[&'static CStr],
    optional: &[&'static CStr],
    unsupported: fn(String) -> DriverError,
) -> Result<Vec<&'static CStr>, DriverError> {
    let mut enabled = Vec::with_capacity(required.len() + optional.len());

    for &name in required {
        if !is_supported(supported, name) {
            return Err(unsupported(name.to_string_lossy().into_owned()).logged());
        }
        enabled.push(name);
    }

    for &name in optional {
        if is_supported(supported, name) {
            enabled.push(name);
        } else {
            log::debug!("optional extension '{}' is not supported", name.to_string_lossy());
        }
    }

    Ok(enabled)
}
