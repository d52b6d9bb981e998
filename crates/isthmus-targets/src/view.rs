//! Per-target views of IR types and names.
//!
//! A [`ViewResolver`] is a pure function of (IR, target): it never mutates
//! the IR, and asking for the same view twice yields the same answer.

use std::collections::BTreeSet;
use std::path::PathBuf;

use isthmus_ir::{DeclId, DeclKind, Deriving, IdentifierStyle, Ir, Site, Ty};
use tracing::debug;

use crate::config::{Naming, TargetConfig};
use crate::error::{Result, TargetError};
use crate::keywords::is_reserved;
use crate::language::TargetLanguage;
use crate::profile::Profile;

/// How a type is spelled in one target, and how it behaves there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeView {
    /// Spelling for plain fields, parameters and return values.
    pub spelling: String,
    /// Spelling when placed inside a nullable wrapper or generic container.
    pub boxed: String,
    /// Whether the spelled type admits an absent value.
    pub nullable: bool,
    /// Whether the target passes the value by value.
    pub by_value: bool,
}

/// Which sides implement an interface or function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Backing {
    /// Implemented natively and called from managed code through a proxy.
    pub native: bool,
    /// Implemented in managed code and called from native code through a
    /// reverse proxy.
    pub managed: bool,
}

pub struct ViewResolver<'a> {
    ir: &'a Ir,
    language: TargetLanguage,
    profile: Profile,
    /// Primitive views indexed by `Primitive as usize`.
    primitives: Vec<TypeView>,
    naming: Naming,
    base: Vec<String>,
}

impl<'a> ViewResolver<'a> {
    /// Prepare a resolver; fails if the profile cannot spell every primitive.
    pub fn new(ir: &'a Ir, config: &TargetConfig, profile: Profile) -> Result<Self> {
        if profile.language != config.language() {
            return Err(TargetError::Validation {
                detail: format!(
                    "profile '{}' is for {} but was selected for {}",
                    profile.name,
                    profile.language,
                    config.language()
                ),
            });
        }
        let primitives = profile
            .total_spellings()?
            .into_iter()
            .map(|s| TypeView {
                spelling: s.typename.clone(),
                boxed: s.boxed_name().to_string(),
                nullable: false,
                by_value: s.by_value,
            })
            .collect();
        debug!(target = %config.language(), profile = %profile.name, "prepared view resolver");
        Ok(Self {
            ir,
            language: config.language(),
            profile,
            primitives,
            naming: config.naming(),
            base: config.base_namespace(),
        })
    }

    pub fn ir(&self) -> &'a Ir {
        self.ir
    }

    pub fn language(&self) -> TargetLanguage {
        self.language
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    pub fn backing(&self, id: DeclId) -> Backing {
        let sides = match &self.ir.decl(id).kind {
            DeclKind::Interface(i) => &i.implemented_by,
            DeclKind::Function(f) => &f.implemented_by,
            _ => return Backing::default(),
        };
        Backing {
            native: sides.contains(&isthmus_ir::Side::Native),
            managed: sides.contains(&isthmus_ir::Side::Managed),
        }
    }

    /// Derived capabilities of a record; empty for every other kind.
    pub fn capabilities(&self, id: DeclId) -> BTreeSet<Deriving> {
        match &self.ir.decl(id).kind {
            DeclKind::Record(r) => r.deriving.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Render a type for this target.
    pub fn view(&self, ty: &Ty) -> TypeView {
        match ty {
            Ty::Primitive(p) => self.primitives[*p as usize].clone(),
            Ty::Optional(inner) => self.optional_view(inner),
            Ty::List(inner) => self.container(&self.profile.containers.list, &[inner]),
            Ty::Set(inner) => self.container(&self.profile.containers.set, &[inner]),
            Ty::Map(key, value) => self.container(&self.profile.containers.map, &[key, value]),
            Ty::Declared(id) => self.declared_view(*id),
        }
    }

    fn optional_view(&self, inner: &Ty) -> TypeView {
        let inner_view = self.view(inner);
        let spelling = match self.language {
            TargetLanguage::Cpp if inner_view.nullable => inner_view.spelling.clone(),
            TargetLanguage::Cpp => {
                let wrapper = self.profile.containers.optional.as_deref().unwrap_or("std::optional");
                format!("{wrapper}<{}>", inner_view.boxed)
            }
            TargetLanguage::Java => match &self.profile.containers.optional {
                Some(wrapper) => format!("{wrapper}<{}>", inner_view.boxed),
                None => inner_view.boxed.clone(),
            },
            TargetLanguage::CSharp => format!("{}?", inner_view.boxed),
        };
        TypeView {
            boxed: spelling.clone(),
            spelling,
            nullable: true,
            by_value: inner_view.by_value && self.language != TargetLanguage::Java,
        }
    }

    fn container(&self, template: &str, args: &[&Ty]) -> TypeView {
        let args: Vec<String> = args.iter().map(|a| self.view(a).boxed).collect();
        let spelling = format!("{template}<{}>", args.join(", "));
        TypeView {
            boxed: spelling.clone(),
            spelling,
            nullable: false,
            by_value: false,
        }
    }

    fn declared_view(&self, id: DeclId) -> TypeView {
        let name = self.qualified_type_name(id);
        let kind = &self.ir.decl(id).kind;
        let (spelling, nullable, by_value) = match (self.language, kind) {
            (TargetLanguage::Cpp, DeclKind::Interface(_)) => (format!("std::shared_ptr<{name}>"), true, false),
            (TargetLanguage::Cpp, DeclKind::Function(_)) => (name, true, false),
            (TargetLanguage::Cpp, DeclKind::Enum(_) | DeclKind::Flags(_)) => (name, false, true),
            (TargetLanguage::Java, DeclKind::Flags(_)) => (format!("java.util.EnumSet<{name}>"), false, false),
            (TargetLanguage::CSharp, DeclKind::Enum(_) | DeclKind::Flags(_)) => (name, false, true),
            _ => (name, false, false),
        };
        TypeView {
            boxed: spelling.clone(),
            spelling,
            nullable,
            by_value,
        }
    }

    /// The namespace (or package) a declaration is emitted into.
    pub fn namespace_of(&self, id: DeclId) -> Vec<String> {
        let decl = self.ir.decl(id);
        self.base
            .iter()
            .cloned()
            .chain(decl.namespace_path().iter().map(|s| self.naming.package.apply(s)))
            .collect()
    }

    /// Unqualified type name, without reserved-word checking.
    pub fn local_type_name(&self, id: DeclId) -> String {
        self.naming.ty.apply(&self.ir.decl(id).name)
    }

    /// Unqualified type name, checked against reserved words.
    pub fn type_name(&self, id: DeclId) -> Result<String> {
        let decl = self.ir.decl(id);
        self.checked(&self.naming.ty, &decl.name, id, &decl.site)
    }

    pub fn qualified_type_name(&self, id: DeclId) -> String {
        let namespace = self.namespace_of(id);
        let name = self.local_type_name(id);
        match self.language {
            TargetLanguage::Cpp => {
                let mut out = String::new();
                for segment in &namespace {
                    out.push_str("::");
                    out.push_str(segment);
                }
                format!("{out}::{name}")
            }
            TargetLanguage::Java | TargetLanguage::CSharp => {
                if namespace.is_empty() {
                    name
                } else {
                    format!("{}.{name}", namespace.join("."))
                }
            }
        }
    }

    pub fn field_name(&self, name: &str, owner: DeclId, site: &Site) -> Result<String> {
        self.checked(&self.naming.field, name, owner, site)
    }

    pub fn method_name(&self, name: &str, owner: DeclId, site: &Site) -> Result<String> {
        self.checked(&self.naming.method, name, owner, site)
    }

    pub fn enum_item_name(&self, name: &str, owner: DeclId) -> Result<String> {
        let site = &self.ir.decl(owner).site;
        self.checked(&self.naming.enum_item, name, owner, site)
    }

    pub fn constant_name(&self, name: &str, owner: DeclId, site: &Site) -> Result<String> {
        self.checked(&self.naming.constant, name, owner, site)
    }

    /// Output path of a declaration's source file, relative to the target's
    /// output directory.
    pub fn file_path(&self, id: DeclId) -> PathBuf {
        let mut path: PathBuf = self.namespace_of(id).iter().collect();
        let stem = match self.language {
            TargetLanguage::Cpp => self.naming.file.apply(&self.ir.decl(id).name),
            TargetLanguage::Java | TargetLanguage::CSharp => self.local_type_name(id),
        };
        path.push(format!("{stem}.{}", self.language.source_extension()));
        path
    }

    fn checked(&self, style: &IdentifierStyle, name: &str, owner: DeclId, site: &Site) -> Result<String> {
        let identifier = style.apply(name);
        if is_reserved(self.language, &identifier) {
            return Err(TargetError::ReservedIdentifier {
                target: self.language.display_name().into(),
                identifier,
                name: self.ir.qualified_name(owner).key(),
                site: site.clone(),
            });
        }
        Ok(identifier)
    }
}
