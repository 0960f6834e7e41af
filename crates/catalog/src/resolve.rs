//! Name resolution with module aliases and standard-library fallback.
//!
//! A name written by a user may be unqualified (`foo`), aliased (`m::foo` where
//! `m` stands for some other module), pinned to the caller's current module
//! (`__current__::foo`) or pinned to the standard library (`__std__::foo`).
//! [`search`] turns it into the sequence of fully qualified candidates and
//! returns the first one the getter accepts.

use std::collections::BTreeMap;

use common::{CatalogConfig, SchemaError, SchemaResult, Span, with_article};
use types::Name;

use crate::registry::{Object, SchemaClass};

/// Module alias table used during lookups.
///
/// The default module doubles as the alias for "no module given" and as the
/// expansion of the current-module anchor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleAliases {
    default_module: Option<String>,
    aliases: BTreeMap<String, String>,
}

impl ModuleAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(module: impl Into<String>) -> Self {
        Self {
            default_module: Some(module.into()),
            aliases: BTreeMap::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>, module: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), module.into());
        self
    }

    pub fn default_module(&self) -> Option<&str> {
        self.default_module.as_deref()
    }

    /// Target of `alias`; `None` stands for the default module.
    pub fn get(&self, alias: Option<&str>) -> Option<&str> {
        match alias {
            None => self.default_module(),
            Some(alias) => self.aliases.get(alias).map(String::as_str),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.default_module.is_none() && self.aliases.is_empty()
    }
}

/// Knobs for a name lookup.
#[derive(Clone, Copy, Default)]
pub struct LookupOptions<'a> {
    pub module_aliases: Option<&'a ModuleAliases>,
    /// Expected class; a hit of another class is a wrong-type error.
    pub class: Option<SchemaClass>,
    /// Candidates rejected by the predicate are treated as misses.
    pub condition: Option<&'a dyn Fn(Object) -> bool>,
    /// Noun used in not-found errors instead of the class name.
    pub label: Option<&'a str>,
    pub span: Option<&'a Span>,
    /// Root modules that must not be retried under the standard library.
    pub disallow_module: Option<&'a dyn Fn(&str) -> bool>,
}

impl<'a> LookupOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aliases(mut self, aliases: &'a ModuleAliases) -> Self {
        self.module_aliases = Some(aliases);
        self
    }

    pub fn with_class(mut self, class: SchemaClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_condition(mut self, condition: &'a dyn Fn(Object) -> bool) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_span(mut self, span: &'a Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_disallow_module(mut self, disallow: &'a dyn Fn(&str) -> bool) -> Self {
        self.disallow_module = Some(disallow);
        self
    }

    pub(crate) fn is_disallowed(&self, module: &str) -> bool {
        self.disallow_module.is_some_and(|f| f(module))
    }

    pub(crate) fn accepts(&self, obj: Object) -> bool {
        self.condition.is_none_or(|f| f(obj))
    }
}

impl std::fmt::Debug for LookupOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupOptions")
            .field("module_aliases", &self.module_aliases)
            .field("class", &self.class)
            .field("condition", &self.condition.is_some())
            .field("label", &self.label)
            .field("span", &self.span)
            .field("disallow_module", &self.disallow_module.is_some())
            .finish()
    }
}

fn strip_anchor<'m>(module: &'m str, anchor: &str) -> Option<Option<&'m str>> {
    if module == anchor {
        return Some(None);
    }
    module
        .strip_prefix(anchor)
        .and_then(|rest| rest.strip_prefix(types::PATH_SEPARATOR))
        .map(Some)
}

/// Rewrite the module part of a name through the alias table.
///
/// Returns whether the current-module anchor was used, and the resolved module.
/// An anchored name with no default module resolves to no module at all.
pub fn apply_module_aliases(
    module: Option<&str>,
    aliases: Option<&ModuleAliases>,
    config: &CatalogConfig,
) -> (bool, Option<String>) {
    let current = aliases.and_then(ModuleAliases::default_module);

    if let Some(rest) = module.and_then(|m| strip_anchor(m, &config.current_module_anchor)) {
        let resolved = current.map(|current| match rest {
            Some(rest) => format!("{current}{}{rest}", types::PATH_SEPARATOR),
            None => current.to_string(),
        });
        return (true, resolved);
    }

    let Some(aliases) = aliases else {
        return (false, module.map(str::to_string));
    };

    let (first, rest) = match module {
        Some(module) => match module.split_once(types::PATH_SEPARATOR) {
            Some((first, rest)) => (Some(first), Some(rest)),
            None => (Some(module), None),
        },
        None => (None, None),
    };

    let resolved = match aliases.get(first) {
        Some(target) => match rest {
            Some(rest) => Some(format!("{target}{}{rest}", types::PATH_SEPARATOR)),
            None => Some(target.to_string()),
        },
        None => module.map(str::to_string),
    };
    (false, resolved)
}

/// Find the first candidate for `name` accepted by `getter`.
///
/// Candidates, in order:
/// 1. `std::name` for names anchored at the std marker, and nothing else;
/// 2. the alias-expanded `module::name`;
/// 3. unless the current-module anchor was used: `std::name` when no module
///    was written, or `std::module::name` when the module's root is neither a
///    known module nor disallowed.
pub fn search<T>(
    name: &Name,
    config: &CatalogConfig,
    opts: &LookupOptions<'_>,
    has_module: impl Fn(&str) -> bool,
    mut getter: impl FnMut(&Name) -> SchemaResult<Option<T>>,
) -> SchemaResult<Option<T>> {
    let shortname = name.name();
    let orig_module = name.module();

    if orig_module == Some(config.std_anchor.as_str()) {
        return getter(&Name::qualified(config.std_module.as_str(), shortname));
    }

    let (is_current, module) = apply_module_aliases(orig_module, opts.module_aliases, config);
    if is_current && module.is_none() {
        return Ok(None);
    }

    if let Some(module) = &module
        && let Some(hit) = getter(&Name::qualified(module.as_str(), shortname))?
    {
        return Ok(Some(hit));
    }

    if is_current {
        return Ok(None);
    }

    if orig_module.is_none()
        && let Some(hit) = getter(&Name::qualified(config.std_module.as_str(), shortname))?
    {
        return Ok(Some(hit));
    }

    if let Some(module) = &module {
        let root = module
            .split_once(types::PATH_SEPARATOR)
            .map_or(module.as_str(), |(root, _)| root);
        if !(has_module(root) || opts.is_disallowed(root)) {
            let std_module = format!("{}{}{module}", config.std_module, types::PATH_SEPARATOR);
            return getter(&Name::qualified(std_module, shortname));
        }
    }

    Ok(None)
}

/// Not-found error for `name`, phrased for the expected class.
pub fn bad_reference(name: &Name, opts: &LookupOptions<'_>) -> SchemaError {
    let label = match (opts.label, opts.class) {
        (Some(label), _) => label.to_string(),
        (None, Some(class)) => class.display_name().to_string(),
        (None, None) => "schema item".to_string(),
    };

    let refname = match opts.class {
        Some(class) if class.is_qualified() => {
            let default = opts.module_aliases.and_then(ModuleAliases::default_module);
            let qualified = match default {
                Some(default) if !name.is_qualified() => Name::qualified(default, name.name()),
                _ => name.clone(),
            };
            display_name(class, &qualified)
        }
        Some(class) => display_name(class, name),
        None => name.to_string(),
    };

    SchemaError::InvalidReference {
        label,
        name: refname,
        span: opts.span.cloned(),
    }
}

/// Wrong-type error for a hit of class `actual` where `expected` was asked for.
pub fn wrong_type(
    name: &Name,
    actual: SchemaClass,
    expected: SchemaClass,
    span: Option<&Span>,
) -> SchemaError {
    SchemaError::WrongType {
        name: name.to_string(),
        actual: with_article(actual.display_name()),
        expected: with_article(expected.display_name()),
        span: span.cloned(),
    }
}

/// User-facing rendering of a name; overloads are shown by their short name.
pub fn display_name(class: SchemaClass, name: &Name) -> String {
    if class.descriptor().overloaded {
        name.shortname().to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn config() -> CatalogConfig {
        CatalogConfig::default()
    }

    /// Records every candidate and accepts only `accept`.
    fn probe(
        name: &str,
        opts: &LookupOptions<'_>,
        known: &[&str],
        accept: Option<&str>,
    ) -> (Option<Name>, Vec<String>) {
        let tried = RefCell::new(Vec::new());
        let hit = search(
            &Name::parse(name),
            &config(),
            opts,
            |m| known.contains(&m),
            |candidate| {
                tried.borrow_mut().push(candidate.to_string());
                Ok(accept
                    .filter(|a| *a == candidate.to_string())
                    .map(|_| candidate.clone()))
            },
        )
        .unwrap();
        (hit, tried.into_inner())
    }

    #[test]
    fn unqualified_falls_back_to_std() {
        let (hit, tried) = probe("len", &LookupOptions::new(), &["std"], Some("std::len"));
        assert_eq!(hit, Some(Name::qualified("std", "len")));
        assert_eq!(tried, vec!["std::len"]);
    }

    #[test]
    fn default_module_is_tried_before_std() {
        let aliases = ModuleAliases::with_default("default");
        let opts = LookupOptions::new().with_aliases(&aliases);
        let (_, tried) = probe("len", &opts, &["std", "default"], None);
        assert_eq!(tried, vec!["default::len", "std::len"]);
    }

    #[test]
    fn unknown_root_module_retries_under_std() {
        let (hit, tried) = probe(
            "math::abs",
            &LookupOptions::new(),
            &["std"],
            Some("std::math::abs"),
        );
        assert_eq!(hit, Some(Name::qualified("std::math", "abs")));
        assert_eq!(tried, vec!["math::abs", "std::math::abs"]);
    }

    #[test]
    fn known_root_module_does_not_fall_back() {
        let (hit, tried) = probe(
            "default::abs",
            &LookupOptions::new(),
            &["std", "default"],
            Some("std::default::abs"),
        );
        assert_eq!(hit, None);
        assert_eq!(tried, vec!["default::abs"]);
    }

    #[test]
    fn disallowed_module_does_not_fall_back() {
        let disallow = |m: &str| m == "app";
        let opts = LookupOptions::new().with_disallow_module(&disallow);
        let (_, tried) = probe("app::thing", &opts, &["std"], None);
        assert_eq!(tried, vec!["app::thing"]);
    }

    #[test]
    fn std_anchor_resolves_directly() {
        let aliases = ModuleAliases::with_default("default");
        let opts = LookupOptions::new().with_aliases(&aliases);
        let (hit, tried) = probe("__std__::str", &opts, &["std"], Some("std::str"));
        assert_eq!(hit, Some(Name::qualified("std", "str")));
        assert_eq!(tried, vec!["std::str"]);
    }

    #[test]
    fn current_anchor_never_falls_back() {
        let aliases = ModuleAliases::with_default("app");
        let opts = LookupOptions::new().with_aliases(&aliases);
        let (_, tried) = probe("__current__::foo", &opts, &["std"], None);
        assert_eq!(tried, vec!["app::foo"]);

        let (_, tried) = probe("__current__::sub::foo", &opts, &["std"], None);
        assert_eq!(tried, vec!["app::sub::foo"]);

        let (hit, tried) = probe("__current__::foo", &LookupOptions::new(), &["std"], None);
        assert_eq!(hit, None);
        assert!(tried.is_empty());
    }

    #[test]
    fn aliases_rewrite_the_root_segment() {
        let aliases = ModuleAliases::new().alias("m", "my::module");
        let opts = LookupOptions::new().with_aliases(&aliases);
        let (hit, tried) = probe(
            "m::sub::x",
            &opts,
            &["std", "my"],
            Some("my::module::sub::x"),
        );
        assert_eq!(hit, Some(Name::qualified("my::module::sub", "x")));
        assert_eq!(tried, vec!["my::module::sub::x"]);
    }

    #[test]
    fn bad_reference_uses_default_module_for_qualified_classes() {
        let aliases = ModuleAliases::with_default("default");
        let opts = LookupOptions::new()
            .with_aliases(&aliases)
            .with_class(SchemaClass::ObjectType);
        let err = bad_reference(&Name::parse("User"), &opts);
        assert_eq!(err.to_string(), "object type 'default::User' does not exist");
    }

    #[test]
    fn bad_reference_prefers_explicit_label() {
        let span = Span::new(4, 8);
        let opts = LookupOptions::new().with_label("base type").with_span(&span);
        let err = bad_reference(&Name::parse("x::Y"), &opts);
        assert_eq!(err.to_string(), "base type 'x::Y' does not exist");
        assert_eq!(err.span(), Some(&span));
    }

    #[test]
    fn overload_names_render_without_signature() {
        let name = Name::qualified("std", "len@str");
        assert_eq!(display_name(SchemaClass::Function, &name), "std::len");
        assert_eq!(display_name(SchemaClass::ScalarType, &name), "std::len@str");
    }
}
