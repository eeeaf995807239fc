//! Raw FreeImage entry points, resolved at runtime.

use core::ffi::{c_char, c_int, c_uint, c_void};
use std::cell::RefCell;
use std::ffi::CStr;
use std::path::Path;

use libloading::Library;

use crate::error::CodecError;

pub(crate) type Bool = c_int;
pub(crate) type Fif = c_int;

pub(crate) const FIF_UNKNOWN: Fif = -1;

#[repr(C)]
pub(crate) struct FiBitmap {
    _private: [u8; 0],
}

#[repr(C)]
pub(crate) struct FiMemory {
    _private: [u8; 0],
}

#[repr(C)]
pub(crate) struct FiMetadata {
    _private: [u8; 0],
}

#[repr(C)]
pub(crate) struct FiTag {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct RgbQuad {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
    pub reserved: u8,
}

// FREE_IMAGE_TYPE
pub(crate) const FIT_BITMAP: c_int = 1;
pub(crate) const FIT_UINT16: c_int = 2;
pub(crate) const FIT_FLOAT: c_int = 6;
pub(crate) const FIT_RGB16: c_int = 9;
pub(crate) const FIT_RGBA16: c_int = 10;
pub(crate) const FIT_RGBF: c_int = 11;
pub(crate) const FIT_RGBAF: c_int = 12;

// FREE_IMAGE_COLOR_TYPE
pub(crate) const FIC_MINISBLACK: c_int = 1;

// FREE_IMAGE_MDTYPE
pub(crate) const FIDT_BYTE: u16 = 1;
pub(crate) const FIDT_ASCII: u16 = 2;
pub(crate) const FIDT_SHORT: u16 = 3;
pub(crate) const FIDT_LONG: u16 = 4;
pub(crate) const FIDT_RATIONAL: u16 = 5;
pub(crate) const FIDT_UNDEFINED: u16 = 7;
pub(crate) const FIDT_SLONG: u16 = 9;
pub(crate) const FIDT_SRATIONAL: u16 = 10;
pub(crate) const FIDT_FLOAT: u16 = 11;
pub(crate) const FIDT_DOUBLE: u16 = 12;
pub(crate) const FIDT_IFD: u16 = 13;

/// FREE_IMAGE_MDMODEL ids and the names used in [`crate::Metadata`].
pub(crate) const METADATA_MODELS: &[(c_int, &str)] = &[
    (0, "COMMENTS"),
    (1, "EXIF_MAIN"),
    (2, "EXIF_EXIF"),
    (3, "EXIF_GPS"),
    (4, "EXIF_MAKERNOTE"),
    (5, "EXIF_INTEROP"),
    (6, "IPTC"),
    (7, "XMP"),
    (8, "GEOTIFF"),
    (9, "ANIMATION"),
    (10, "CUSTOM"),
    (11, "EXIF_RAW"),
];

// Channel masks for 24/32-bit FIT_BITMAP, matching FreeImage's own color order.
#[cfg(target_endian = "little")]
pub(crate) const RGB_MASKS: (u32, u32, u32) = (0x00FF_0000, 0x0000_FF00, 0x0000_00FF);
#[cfg(target_endian = "big")]
pub(crate) const RGB_MASKS: (u32, u32, u32) = (0xFF00_0000, 0x00FF_0000, 0x0000_FF00);

type OutputMessageFn = extern "C" fn(Fif, *const c_char);

macro_rules! freeimage_api {
    ($( $field:ident = $symbol:literal : fn($($arg:ty),*) $(-> $ret:ty)?; )*) => {
        /// Function table resolved from the FreeImage shared library.
        pub(crate) struct Api {
            $( pub $field: unsafe extern "system" fn($($arg),*) $(-> $ret)?, )*
            _library: Library,
        }

        impl Api {
            /// # Safety
            /// `library` must be a FreeImage build exporting these symbols
            /// with their documented signatures.
            unsafe fn resolve(library: Library) -> Result<Self, libloading::Error> {
                Ok(Self {
                    $( $field: unsafe {
                        *library.get::<unsafe extern "system" fn($($arg),*) $(-> $ret)?>(
                            concat!($symbol, "\0").as_bytes(),
                        )?
                    }, )*
                    _library: library,
                })
            }
        }
    };
}

freeimage_api! {
    initialise = "FreeImage_Initialise": fn(Bool);
    deinitialise = "FreeImage_DeInitialise": fn();
    get_version = "FreeImage_GetVersion": fn() -> *const c_char;
    set_output_message = "FreeImage_SetOutputMessage": fn(OutputMessageFn);

    get_fif_count = "FreeImage_GetFIFCount": fn() -> c_int;
    is_plugin_enabled = "FreeImage_IsPluginEnabled": fn(Fif) -> c_int;
    get_format_from_fif = "FreeImage_GetFormatFromFIF": fn(Fif) -> *const c_char;
    get_fif_description = "FreeImage_GetFIFDescription": fn(Fif) -> *const c_char;
    get_fif_extension_list = "FreeImage_GetFIFExtensionList": fn(Fif) -> *const c_char;
    get_file_type = "FreeImage_GetFileType": fn(*const c_char, c_int) -> Fif;
    get_file_type_from_memory = "FreeImage_GetFileTypeFromMemory": fn(*mut FiMemory, c_int) -> Fif;
    get_fif_from_filename = "FreeImage_GetFIFFromFilename": fn(*const c_char) -> Fif;
    fif_supports_reading = "FreeImage_FIFSupportsReading": fn(Fif) -> Bool;
    fif_supports_writing = "FreeImage_FIFSupportsWriting": fn(Fif) -> Bool;
    fif_supports_export_bpp = "FreeImage_FIFSupportsExportBPP": fn(Fif, c_int) -> Bool;
    fif_supports_export_type = "FreeImage_FIFSupportsExportType": fn(Fif, c_int) -> Bool;

    open_memory = "FreeImage_OpenMemory": fn(*mut u8, u32) -> *mut FiMemory;
    close_memory = "FreeImage_CloseMemory": fn(*mut FiMemory);
    acquire_memory = "FreeImage_AcquireMemory": fn(*mut FiMemory, *mut *mut u8, *mut u32) -> Bool;
    load_from_memory = "FreeImage_LoadFromMemory": fn(Fif, *mut FiMemory, c_int) -> *mut FiBitmap;
    save_to_memory = "FreeImage_SaveToMemory": fn(Fif, *mut FiBitmap, *mut FiMemory, c_int) -> Bool;

    allocate_t = "FreeImage_AllocateT": fn(c_int, c_int, c_int, c_int, c_uint, c_uint, c_uint) -> *mut FiBitmap;
    unload = "FreeImage_Unload": fn(*mut FiBitmap);
    convert_to_32_bits = "FreeImage_ConvertTo32Bits": fn(*mut FiBitmap) -> *mut FiBitmap;
    get_image_type = "FreeImage_GetImageType": fn(*mut FiBitmap) -> c_int;
    get_color_type = "FreeImage_GetColorType": fn(*mut FiBitmap) -> c_int;
    get_bpp = "FreeImage_GetBPP": fn(*mut FiBitmap) -> c_uint;
    get_width = "FreeImage_GetWidth": fn(*mut FiBitmap) -> c_uint;
    get_height = "FreeImage_GetHeight": fn(*mut FiBitmap) -> c_uint;
    get_scan_line = "FreeImage_GetScanLine": fn(*mut FiBitmap, c_int) -> *mut u8;
    get_palette = "FreeImage_GetPalette": fn(*mut FiBitmap) -> *mut RgbQuad;

    find_first_metadata = "FreeImage_FindFirstMetadata": fn(c_int, *mut FiBitmap, *mut *mut FiTag) -> *mut FiMetadata;
    find_next_metadata = "FreeImage_FindNextMetadata": fn(*mut FiMetadata, *mut *mut FiTag) -> Bool;
    find_close_metadata = "FreeImage_FindCloseMetadata": fn(*mut FiMetadata);
    set_metadata = "FreeImage_SetMetadata": fn(c_int, *mut FiBitmap, *const c_char, *mut FiTag) -> Bool;
    create_tag = "FreeImage_CreateTag": fn() -> *mut FiTag;
    delete_tag = "FreeImage_DeleteTag": fn(*mut FiTag);
    get_tag_key = "FreeImage_GetTagKey": fn(*mut FiTag) -> *const c_char;
    get_tag_type = "FreeImage_GetTagType": fn(*mut FiTag) -> c_int;
    get_tag_count = "FreeImage_GetTagCount": fn(*mut FiTag) -> u32;
    get_tag_length = "FreeImage_GetTagLength": fn(*mut FiTag) -> u32;
    get_tag_value = "FreeImage_GetTagValue": fn(*mut FiTag) -> *const c_void;
    set_tag_key = "FreeImage_SetTagKey": fn(*mut FiTag, *const c_char) -> Bool;
    set_tag_type = "FreeImage_SetTagType": fn(*mut FiTag, c_int) -> Bool;
    set_tag_count = "FreeImage_SetTagCount": fn(*mut FiTag, u32) -> Bool;
    set_tag_length = "FreeImage_SetTagLength": fn(*mut FiTag, u32) -> Bool;
    set_tag_value = "FreeImage_SetTagValue": fn(*mut FiTag, *const c_void) -> Bool;
}

#[cfg(target_os = "windows")]
const DEFAULT_NAMES: &[&str] = &["FreeImage.dll", "freeimage.dll"];
#[cfg(target_os = "macos")]
const DEFAULT_NAMES: &[&str] = &["libfreeimage.3.dylib", "libfreeimage.dylib"];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_NAMES: &[&str] = &["libfreeimage.so.3", "libfreeimage.so"];

/// Environment variable naming an explicit FreeImage library path.
pub const LIBRARY_ENV: &str = "FREEIMAGE_LIBRARY";

impl Api {
    /// Load from `$FREEIMAGE_LIBRARY`, then the platform's default names.
    pub(crate) fn load() -> Result<Self, CodecError> {
        let mut failures = alloc::vec::Vec::new();
        let from_env = std::env::var_os(LIBRARY_ENV);
        let candidates = from_env
            .iter()
            .map(|p| p.as_os_str())
            .chain(DEFAULT_NAMES.iter().map(|n| std::ffi::OsStr::new(*n)));
        for candidate in candidates {
            match Self::load_from(Path::new(candidate)) {
                Ok(api) => return Ok(api),
                Err(e) => {
                    log::debug!("FreeImage not loadable from {candidate:?}: {e}");
                    failures.push(alloc::format!("{candidate:?}: {e}"));
                }
            }
        }
        Err(CodecError::LibraryUnavailable(failures.join("; ")))
    }

    pub(crate) fn load_from(path: &Path) -> Result<Self, CodecError> {
        let unavailable = |e: libloading::Error| CodecError::LibraryUnavailable(e.to_string());
        // SAFETY: loading FreeImage runs only its own initializers.
        let library = unsafe { Library::new(path) }.map_err(unavailable)?;
        // SAFETY: symbol signatures follow FreeImage.h for the 3.x series.
        let api = unsafe { Self::resolve(library) }.map_err(unavailable)?;
        // SAFETY: plain calls into a resolved library; the callback is 'static.
        unsafe {
            (api.initialise)(0);
            (api.set_output_message)(record_message);
        }
        log::info!("loaded FreeImage {} from {}", api.version(), path.display());
        Ok(api)
    }

    pub(crate) fn version(&self) -> alloc::string::String {
        // SAFETY: returns a static NUL-terminated string.
        unsafe { c_str((self.get_version)()) }
            .map(|v| alloc::string::String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default()
    }
}

impl Drop for Api {
    fn drop(&mut self) {
        // SAFETY: balanced with the FreeImage_Initialise in load_from.
        unsafe { (self.deinitialise)() }
    }
}

/// Borrow a NUL-terminated native string, or `None` for null.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a [u8]> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_bytes())
    }
}

std::thread_local! {
    static LAST_MESSAGE: RefCell<Option<alloc::string::String>> = const { RefCell::new(None) };
}

extern "C" fn record_message(fif: Fif, message: *const c_char) {
    // SAFETY: FreeImage passes a NUL-terminated message valid for this call.
    let text = unsafe { c_str(message) }
        .map(|m| alloc::string::String::from_utf8_lossy(m).into_owned())
        .unwrap_or_default();
    log::debug!("FreeImage (format {fif}): {text}");
    LAST_MESSAGE.with(|m| *m.borrow_mut() = Some(text));
}

/// Forget any message left over from an earlier call on this thread.
pub(crate) fn clear_message() {
    LAST_MESSAGE.with(|m| m.borrow_mut().take());
}

/// The library's last message on this thread, or `fallback`.
pub(crate) fn take_message(fallback: &str) -> alloc::string::String {
    LAST_MESSAGE
        .with(|m| m.borrow_mut().take())
        .unwrap_or_else(|| fallback.into())
}
