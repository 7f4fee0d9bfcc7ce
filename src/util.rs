#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IfaceFlags {
	pub up: bool,
	pub multicast: bool,
	pub loopback: bool,
}

/// Reads the interface flags for `name` with `getifaddrs(3)`.
///
/// Unknown interfaces come back with every flag clear, which keeps them out of multicast.
#[cfg(unix)]
pub fn iface_flags(name: &str) -> IfaceFlags {
	use std::ffi::CStr;

	let mut flags = IfaceFlags::default();

	let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
	if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
		return flags;
	}

	let mut cursor = ifap;
	while !cursor.is_null() {
		let ifa = unsafe { &*cursor };
		cursor = ifa.ifa_next;

		if ifa.ifa_name.is_null() || unsafe { CStr::from_ptr(ifa.ifa_name) }.to_bytes() != name.as_bytes() {
			continue;
		}

		let raw = ifa.ifa_flags as libc::c_int;
		flags = IfaceFlags {
			up: raw & libc::IFF_UP != 0,
			multicast: raw & libc::IFF_MULTICAST != 0,
			loopback: raw & libc::IFF_LOOPBACK != 0,
		};
		break;
	}

	unsafe { libc::freeifaddrs(ifap) };

	flags
}

/// Windows only reports adapters that are up through `if_addrs`, and they all do multicast.
#[cfg(windows)]
pub fn iface_flags(_name: &str) -> IfaceFlags {
	IfaceFlags {
		up: true,
		multicast: true,
		loopback: false,
	}
}

/// The running kernel's `(major, minor)` version, from `uname(2)`.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn kernel_version() -> Option<(u32, u32)> {
	use std::ffi::CStr;

	let mut uts = unsafe { std::mem::zeroed::<libc::utsname>() };
	if unsafe { libc::uname(&mut uts) } != 0 {
		return None;
	}

	let release = unsafe { CStr::from_ptr(uts.release.as_ptr()) }.to_str().ok()?;
	parse_kernel_release(release)
}

/// Parses the leading `major.minor` out of a release string such as `5.15.0-91-generic`.
#[cfg_attr(not(any(target_os = "linux", target_os = "android")), allow(dead_code))]
pub fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
	let mut parts = release.split(|ch: char| !ch.is_ascii_digit());
	let major = parts.next()?.parse().ok()?;
	let minor = parts.next()?.parse().ok()?;
	Some((major, minor))
}
