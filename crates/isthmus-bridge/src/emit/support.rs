//! Hand-written runtime library shipped next to the generated code.
//!
//! Generated sources call into these files for wire codecs, handle tables,
//! error envelopes and properties. They are embedded at build time and
//! copied verbatim under each target's output directory.

use isthmus_targets::TargetLanguage;

use super::GeneratedFile;

const RUNTIME_HPP: &str = include_str!("../../support/cpp/isthmus/runtime.hpp");
const JNI_HPP: &str = include_str!("../../support/java/jni/isthmus/jni.hpp");
const CABI_HPP: &str = include_str!("../../support/csharp/cabi/isthmus/cabi.hpp");

macro_rules! java_runtime {
    ($($name:literal),* $(,)?) => {
        [$((
            concat!("io/isthmus/runtime/", $name, ".java"),
            include_str!(concat!("../../support/java/io/isthmus/runtime/", $name, ".java")),
        )),*]
    };
}

macro_rules! csharp_runtime {
    ($($name:literal),* $(,)?) => {
        [$((
            concat!("Isthmus/Runtime/", $name, ".cs"),
            include_str!(concat!("../../support/csharp/Isthmus/Runtime/", $name, ".cs")),
        )),*]
    };
}

const JAVA: [(&str, &str); 13] = java_runtime![
    "Codec",
    "Codecs",
    "DomainException",
    "Handles",
    "InvalidHandleException",
    "NativeException",
    "NativeProperty",
    "Property",
    "ReadOnlyProperty",
    "Subscription",
    "WireException",
    "WireReader",
    "WireWriter",
];

const CSHARP: [(&str, &str); 9] = csharp_runtime![
    "Codecs",
    "Dates",
    "DomainException",
    "Handles",
    "Native",
    "NativeProperty",
    "Property",
    "Structural",
    "Wire",
];

/// Runtime sources for one target, relative to its output directory.
///
/// Managed targets also carry the C++ runtime under their glue directory so
/// the glue compiles without a C++ target in the same run.
pub(crate) fn runtime_files(language: TargetLanguage) -> Vec<GeneratedFile> {
    let file = |path: &str, contents: &str| GeneratedFile::new(language, path, contents.to_string());
    match language {
        TargetLanguage::Cpp => vec![file("isthmus/runtime.hpp", RUNTIME_HPP)],
        TargetLanguage::Java => JAVA
            .iter()
            .map(|(path, contents)| file(path, contents))
            .chain([
                file("jni/isthmus/runtime.hpp", RUNTIME_HPP),
                file("jni/isthmus/jni.hpp", JNI_HPP),
            ])
            .collect(),
        TargetLanguage::CSharp => CSHARP
            .iter()
            .map(|(path, contents)| file(path, contents))
            .chain([
                file("cabi/isthmus/runtime.hpp", RUNTIME_HPP),
                file("cabi/isthmus/cabi.hpp", CABI_HPP),
            ])
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn paths(language: TargetLanguage) -> Vec<PathBuf> {
        runtime_files(language).into_iter().map(|f| f.path).collect()
    }

    #[test]
    fn cpp_ships_the_runtime_header() {
        let files = runtime_files(TargetLanguage::Cpp);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("isthmus/runtime.hpp"));
        for needle in ["register_domain", "class DomainError", "struct Codec", "class ReadOnlyProperty"] {
            assert!(files[0].contents.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn java_ships_runtime_package_and_jni_headers() {
        let paths = paths(TargetLanguage::Java);
        assert!(paths.contains(&PathBuf::from("io/isthmus/runtime/Codecs.java")));
        assert!(paths.contains(&PathBuf::from("io/isthmus/runtime/DomainException.java")));
        assert!(paths.contains(&PathBuf::from("jni/isthmus/jni.hpp")));
        assert!(paths.contains(&PathBuf::from("jni/isthmus/runtime.hpp")));

        let files = runtime_files(TargetLanguage::Java);
        let property = files
            .iter()
            .find(|f| f.path.ends_with("NativeProperty.java"))
            .unwrap();
        assert!(property.contents.contains("static <T> long exportedSubscribe(long handle, long callback)"));
        let jni = files.iter().find(|f| f.path.ends_with("jni.hpp")).unwrap();
        assert!(jni.contents.contains("Java_io_isthmus_runtime_NativeProperty_nativeGet"));
        assert!(files.iter().all(|f| f.target == TargetLanguage::Java));
    }

    #[test]
    fn csharp_ships_runtime_namespace_and_cabi_headers() {
        let files = runtime_files(TargetLanguage::CSharp);
        let paths: Vec<&PathBuf> = files.iter().map(|f| &f.path).collect();
        assert!(paths.contains(&&PathBuf::from("Isthmus/Runtime/Codecs.cs")));
        assert!(paths.contains(&&PathBuf::from("cabi/isthmus/cabi.hpp")));
        assert!(paths.contains(&&PathBuf::from("cabi/isthmus/runtime.hpp")));
        for file in files.iter().filter(|f| f.path.extension().is_some_and(|e| e == "cs")) {
            assert!(file.contents.contains("namespace Isthmus.Runtime"), "{}", file.path.display());
        }
    }

    #[test]
    fn envelopes_agree_on_field_order() {
        let cpp = RUNTIME_HPP;
        let domain = cpp.find("Codec<std::string>::write(out, domain)").unwrap();
        let message = cpp.find("Codec<std::string>::write(out, message)").unwrap();
        assert!(domain < message);

        let java = JAVA.iter().find(|(p, _)| p.ends_with("DomainException.java")).unwrap().1;
        assert!(java.find("domainError.domain").unwrap() < java.find("domainError.code").unwrap());

        let cs = CSHARP.iter().find(|(p, _)| p.ends_with("Native.cs")).unwrap().1;
        assert!(cs.find("writer.PutString(domain.Domain)").unwrap() < cs.find("writer.PutString(domain.Code)").unwrap());
    }
}
