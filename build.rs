//! Build script for fili
//!
//! On Windows, embeds the application manifest so that paths longer than
//! 260 characters (MAX_PATH) can be indexed. Deep trees such as
//! `node_modules` or photo library exports routinely exceed that limit.
//!
//! The manifest (`fili.manifest`) sets `longPathAware=true`, which together
//! with the Windows 10 v1607+ registry setting allows paths up to 32,767
//! characters. On other platforms this script does nothing.

fn main() {
    #[cfg(windows)]
    {
        // The .rc file references the manifest as an RT_MANIFEST resource
        embed_resource::compile("fili.rc", embed_resource::NONE);

        println!("cargo:rerun-if-changed=fili.rc");
        println!("cargo:rerun-if-changed=fili.manifest");
    }
}
