// Window descriptor - Platform window identity across the plugin boundary
//
// The windowing side and the backend never share platform types. The window
// travels as a platform tag plus a fixed budget of two pointer-sized words;
// each platform has one payload layout, and a payload only comes back out
// under the tag it went in with.

use std::ffi::{c_ulong, c_void};
use std::fmt;
use std::mem::{self, MaybeUninit};
use std::ptr;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Two pointer-sized words with pointer alignment.
///
/// Stack value, copied freely. Payload size and alignment are checked when
/// the code is compiled, never at run time.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct OpaqueHandle {
    words: [MaybeUninit<*mut c_void>; 2],
}

impl OpaqueHandle {
    pub const SIZE: usize = 2 * mem::size_of::<*mut c_void>();
    pub const ALIGN: usize = mem::align_of::<*mut c_void>();

    pub fn pack<T: Copy>(value: T) -> Self {
        const {
            assert!(mem::size_of::<T>() <= OpaqueHandle::SIZE, "payload exceeds OpaqueHandle size");
            assert!(mem::align_of::<T>() <= OpaqueHandle::ALIGN, "payload exceeds OpaqueHandle alignment");
        }
        let mut handle = Self {
            words: [MaybeUninit::zeroed(); 2],
        };
        unsafe { ptr::write(handle.words.as_mut_ptr().cast::<T>(), value) };
        handle
    }

    /// Reads the payload back.
    ///
    /// # Safety
    /// `T` must be the type this handle was packed from.
    pub unsafe fn unpack<T: Copy>(&self) -> T {
        const {
            assert!(mem::size_of::<T>() <= OpaqueHandle::SIZE, "payload exceeds OpaqueHandle size");
            assert!(mem::align_of::<T>() <= OpaqueHandle::ALIGN, "payload exceeds OpaqueHandle alignment");
        }
        ptr::read(self.words.as_ptr().cast::<T>())
    }
}

/// Window system a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum WindowPlatform {
    Xlib = 1,
    Xcb = 2,
    Wayland = 3,
    Win32 = 4,
}

impl fmt::Display for WindowPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WindowPlatform::Xlib => "xlib",
            WindowPlatform::Xcb => "xcb",
            WindowPlatform::Wayland => "wayland",
            WindowPlatform::Win32 => "win32",
        })
    }
}

/// Payload layout for one platform.
pub trait WindowPayload: Copy {
    const PLATFORM: WindowPlatform;
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct XlibWindow {
    pub display: *mut c_void,
    pub window: c_ulong,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct XcbWindow {
    pub connection: *mut c_void,
    pub window: u32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct WaylandWindow {
    pub display: *mut c_void,
    pub surface: *mut c_void,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Win32Window {
    pub hinstance: *mut c_void,
    pub hwnd: *mut c_void,
}

impl WindowPayload for XlibWindow {
    const PLATFORM: WindowPlatform = WindowPlatform::Xlib;
}

impl WindowPayload for XcbWindow {
    const PLATFORM: WindowPlatform = WindowPlatform::Xcb;
}

impl WindowPayload for WaylandWindow {
    const PLATFORM: WindowPlatform = WindowPlatform::Wayland;
}

impl WindowPayload for Win32Window {
    const PLATFORM: WindowPlatform = WindowPlatform::Win32;
}

/// Platform window identity handed to `RenderingDriver::create_surface`.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct WindowDescriptor {
    platform: WindowPlatform,
    payload: OpaqueHandle,
}

impl WindowDescriptor {
    pub fn new<P: WindowPayload>(payload: P) -> Self {
        Self {
            platform: P::PLATFORM,
            payload: OpaqueHandle::pack(payload),
        }
    }

    pub fn platform(&self) -> WindowPlatform {
        self.platform
    }

    /// Returns the payload if this descriptor was built for `P`'s platform.
    pub fn get<P: WindowPayload>(&self) -> Option<P> {
        if self.platform == P::PLATFORM {
            // SAFETY: the tag is only ever set together with a payload of that platform
            Some(unsafe { self.payload.unpack::<P>() })
        } else {
            None
        }
    }

    /// Builds a descriptor from the handles a windowing library exposes.
    pub fn from_raw(display: RawDisplayHandle, window: RawWindowHandle) -> Option<Self> {
        match (display, window) {
            (RawDisplayHandle::Xlib(d), RawWindowHandle::Xlib(w)) => Some(Self::new(XlibWindow {
                display: d.display.map_or(ptr::null_mut(), |p| p.as_ptr()),
                window: w.window,
            })),
            (RawDisplayHandle::Xcb(d), RawWindowHandle::Xcb(w)) => Some(Self::new(XcbWindow {
                connection: d.connection.map_or(ptr::null_mut(), |p| p.as_ptr()),
                window: w.window.get(),
            })),
            (RawDisplayHandle::Wayland(d), RawWindowHandle::Wayland(w)) => Some(Self::new(WaylandWindow {
                display: d.display.as_ptr(),
                surface: w.surface.as_ptr(),
            })),
            (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(w)) => Some(Self::new(Win32Window {
                hinstance: w.hinstance.map_or(0, |h| h.get()) as *mut c_void,
                hwnd: w.hwnd.get() as *mut c_void,
            })),
            (display, window) => {
                log::error!("unsupported window handle pair: {:?} / {:?}", display, window);
                None
            }
        }
    }
}

impl fmt::Debug for WindowDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowDescriptor")
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, WaylandWindowHandle, XcbDisplayHandle, XcbWindowHandle};
    use std::num::NonZeroU32;
    use std::ptr::NonNull;

    #[test]
    fn test_opaque_handle_budget() {
        assert_eq!(mem::size_of::<OpaqueHandle>(), 2 * mem::size_of::<usize>());
        assert_eq!(mem::align_of::<OpaqueHandle>(), mem::align_of::<usize>());
    }

    #[test]
    fn test_payload_survives_copy() {
        let desc = WindowDescriptor::new(XcbWindow {
            connection: 0x1000 as *mut c_void,
            window: 42,
        });
        let copy = desc;
        let xcb = copy.get::<XcbWindow>().unwrap();
        assert_eq!(xcb.connection as usize, 0x1000);
        assert_eq!(xcb.window, 42);
    }

    #[test]
    fn test_wrong_platform_yields_nothing() {
        let desc = WindowDescriptor::new(WaylandWindow {
            display: 0x10 as *mut c_void,
            surface: 0x20 as *mut c_void,
        });
        assert_eq!(desc.platform(), WindowPlatform::Wayland);
        assert!(desc.get::<XcbWindow>().is_none());
        assert!(desc.get::<Win32Window>().is_none());
        assert!(desc.get::<WaylandWindow>().is_some());
    }

    #[test]
    fn test_from_raw_xcb() {
        let mut connection = 0u8;
        let display = RawDisplayHandle::Xcb(XcbDisplayHandle::new(
            NonNull::new(&mut connection as *mut u8 as *mut c_void),
            0,
        ));
        let window = RawWindowHandle::Xcb(XcbWindowHandle::new(NonZeroU32::new(7).unwrap()));
        let desc = WindowDescriptor::from_raw(display, window).unwrap();
        let xcb = desc.get::<XcbWindow>().unwrap();
        assert_eq!(xcb.window, 7);
        assert_eq!(xcb.connection, &mut connection as *mut u8 as *mut c_void);
    }

    #[test]
    fn test_from_raw_mismatched_pair() {
        let mut object = 0u8;
        let ptr = NonNull::new(&mut object as *mut u8 as *mut c_void).unwrap();
        let display = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(ptr));
        let window = RawWindowHandle::Xcb(XcbWindowHandle::new(NonZeroU32::new(1).unwrap()));
        assert!(WindowDescriptor::from_raw(display, window).is_none());

        let window = RawWindowHandle::Wayland(WaylandWindowHandle::new(ptr));
        assert!(WindowDescriptor::from_raw(display, window).is_some());
    }
}
