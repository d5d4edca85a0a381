//! Centralized integration tests for the service registry pipeline
use classfile_tools::class_file::{ACC_ABSTRACT, ACC_ANNOTATION, ACC_INTERFACE, ACC_PUBLIC, CLINIT};
use classfile_tools::code::opcode;
use classfile_tools::{
    ClassFile, ClassFileBuilder, ClassFileIntrospector, ClassFilePatcher, CodeAttribute,
};
use infrastructure_common::{AnnotationInfo, MarkerConventions, MemberValue};
use infrastructure_composition::{
    DirectoryUnitSink, DirectoryUnitSource, TransformBuilder, TransformConfig,
};
use registry_abstractions::{
    CompiledUnit, RegistrationStatement, TypeIntrospector, UnitLocation, UnitStatus,
};
use registry_impl::{IncrementalOrchestrator, SnapshotStore, CACHE_FILE_NAME};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn orchestrator(conventions: &MarkerConventions, temp_dir: &Path) -> IncrementalOrchestrator {
    IncrementalOrchestrator::new(
        Arc::new(ClassFileIntrospector::new()),
        Arc::new(ClassFilePatcher::new(conventions.clone())),
        conventions.clone(),
        SnapshotStore::in_dir(temp_dir),
    )
}

fn build_marker(conventions: &MarkerConventions, targets: &[&str]) -> AnnotationInfo {
    AnnotationInfo::new(&conventions.builder_annotation).with_member(
        &conventions.builder_targets_member,
        MemberValue::Array(
            targets
                .iter()
                .map(|t| MemberValue::Class(t.to_string()))
                .collect(),
        ),
    )
}

fn provider_marker(conventions: &MarkerConventions, policy: &str) -> AnnotationInfo {
    AnnotationInfo::new(&conventions.provider_annotation).with_member(
        &conventions.provider_policy_member,
        MemberValue::Enum {
            type_name: format!("{}Policy", conventions.provider_annotation),
            constant: policy.to_string(),
        },
    )
}

fn unit_path(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

fn added(name: &str, bytes: Vec<u8>) -> CompiledUnit {
    CompiledUnit::new(UnitLocation::loose(unit_path(name)), UnitStatus::Added, bytes)
}

fn unchanged(name: &str, bytes: Vec<u8>) -> CompiledUnit {
    CompiledUnit::new(UnitLocation::loose(unit_path(name)), UnitStatus::Unchanged, bytes)
}

fn changed(name: &str, bytes: Vec<u8>) -> CompiledUnit {
    CompiledUnit::new(UnitLocation::loose(unit_path(name)), UnitStatus::Changed, bytes)
}

fn capable_base(conventions: &MarkerConventions, name: &str) -> Vec<u8> {
    ClassFileBuilder::class(name)
        .implements(&conventions.builder_interface)
        .build()
        .unwrap()
}

fn inherited_builder(
    conventions: &MarkerConventions,
    name: &str,
    base: &str,
    targets: &[&str],
) -> Vec<u8> {
    ClassFileBuilder::class(name)
        .extends(base)
        .annotate(build_marker(conventions, targets))
        .build()
        .unwrap()
}

fn clinit_code(bytes: &[u8]) -> CodeAttribute {
    let class = ClassFile::parse(bytes).unwrap();
    let method = class.method(CLINIT, "()V").unwrap().unwrap();
    let code = classfile_tools::class_file::find_attribute(
        &class.constant_pool,
        &method.attributes,
        "Code",
    )
    .unwrap()
    .unwrap();
    CodeAttribute::parse(&code.info).unwrap()
}

#[tokio::test]
async fn test_builder_capability_inherited_from_base_class() {
    let conventions = MarkerConventions::default();
    let temp = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(&conventions, temp.path());
    orchestrator.begin(false).await;

    let units = vec![
        added(
            "a.AbstractFactory",
            ClassFileBuilder::class("a.AbstractFactory")
                .implements(&conventions.builder_interface)
                .build()
                .unwrap(),
        ),
        added(
            "a.ConcreteFactory",
            ClassFileBuilder::class("a.ConcreteFactory")
                .extends("a.AbstractFactory")
                .annotate(build_marker(&conventions, &["a.IBar"]))
                .build()
                .unwrap(),
        ),
        added(
            "a.UnrelatedFactory",
            ClassFileBuilder::class("a.UnrelatedFactory")
                .annotate(build_marker(&conventions, &["a.IBar"]))
                .build()
                .unwrap(),
        ),
    ];
    orchestrator.process_units(&units).unwrap();

    let entry = orchestrator.model().get("a.IBar").unwrap();
    assert_eq!(entry.implementations.iter().collect::<Vec<_>>(), vec!["a.ConcreteFactory"]);
    assert_eq!(orchestrator.stats().builders, 1);
}

#[tokio::test]
async fn test_subclass_listed_before_its_base_is_a_builder() {
    let conventions = MarkerConventions::default();
    let temp = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(&conventions, temp.path());
    orchestrator.begin(false).await;

    orchestrator
        .process_units(&[
            added(
                "a.AFactory",
                inherited_builder(&conventions, "a.AFactory", "a.BaseFactory", &["a.IBar"]),
            ),
            added("a.BaseFactory", capable_base(&conventions, "a.BaseFactory")),
        ])
        .unwrap();

    let entry = orchestrator.model().get("a.IBar").unwrap();
    assert_eq!(entry.implementations.iter().collect::<Vec<_>>(), vec!["a.AFactory"]);
}

#[tokio::test]
async fn test_changed_subclass_keeps_registration_with_unchanged_base() {
    let conventions = MarkerConventions::default();
    let temp = TempDir::new().unwrap();
    let registry = ClassFileBuilder::class(&conventions.registry_class)
        .build()
        .unwrap();

    let mut first = orchestrator(&conventions, temp.path());
    first.begin(true).await;
    first
        .process_units(&[
            added("a.Base", capable_base(&conventions, "a.Base")),
            added("a.Sub", inherited_builder(&conventions, "a.Sub", "a.Base", &["a.IBar"])),
            added(&conventions.registry_class, registry.clone()),
        ])
        .unwrap();
    first.finish().await.unwrap();

    let mut second = orchestrator(&conventions, temp.path());
    second.begin(true).await;
    second
        .process_units(&[
            unchanged("a.Base", capable_base(&conventions, "a.Base")),
            changed("a.Sub", inherited_builder(&conventions, "a.Sub", "a.Base", &["a.IBar"])),
            unchanged(&conventions.registry_class, registry),
        ])
        .unwrap();

    let patched = second.finish().await.unwrap().unwrap();
    assert_eq!(
        ClassFilePatcher::registrations(&patched.bytes).unwrap(),
        vec![RegistrationStatement::new("a.IBar", "a.Sub")]
    );
}

#[tokio::test]
async fn test_marked_annotation_types_are_ignored() {
    let conventions = MarkerConventions::default();
    let temp = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(&conventions, temp.path());
    orchestrator.begin(false).await;

    let annotation_type = ClassFileBuilder::interface("a.Marker")
        .access_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION)
        .implements(&conventions.builder_interface)
        .annotate(build_marker(&conventions, &["a.IBar"]))
        .annotate_visible(provider_marker(&conventions, "SINGLE"))
        .build()
        .unwrap();
    let plain_interface = ClassFileBuilder::interface("a.IPlain")
        .annotate(build_marker(&conventions, &["a.IBar"]))
        .build()
        .unwrap();

    orchestrator
        .process_units(&[added("a.Marker", annotation_type), added("a.IPlain", plain_interface)])
        .unwrap();

    assert!(orchestrator.model().is_empty());
    assert_eq!(orchestrator.stats().builders, 0);
    assert_eq!(orchestrator.stats().providers, 0);
}

#[tokio::test]
async fn test_existing_initializer_keeps_its_instructions() -> anyhow::Result<()> {
    let conventions = MarkerConventions::default();
    let temp = TempDir::new()?;
    let mut orchestrator = orchestrator(&conventions, temp.path());
    orchestrator.begin(true).await;

    let registry = ClassFileBuilder::class(&conventions.registry_class)
        .static_initializer(vec![0x00, opcode::RETURN], 1, 0)
        .build()?;
    let factory = ClassFileBuilder::class("a.FooFactory")
        .implements(&conventions.builder_interface)
        .annotate(build_marker(&conventions, &["a.IBar", "a.IBaz"]))
        .build()?;

    let found = orchestrator.process_units(&[
        added("a.FooFactory", factory),
        added(&conventions.registry_class, registry),
    ])?;
    assert!(found);

    let patched = orchestrator.finish().await?.expect("应当改写注册表");
    assert_eq!(patched.statement_count, 2);
    assert_eq!(patched.location.path, unit_path(&conventions.registry_class));

    let code = clinit_code(&patched.bytes);
    assert_eq!(code.code.len(), 2 + 2 * 13);
    assert_eq!(code.code[0], 0x00);
    assert_eq!(code.code.last(), Some(&opcode::RETURN));
    assert!(code.max_stack >= 3);

    assert_eq!(
        ClassFilePatcher::registrations(&patched.bytes)?,
        vec![
            RegistrationStatement::new("a.IBar", "a.FooFactory"),
            RegistrationStatement::new("a.IBaz", "a.FooFactory"),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_patched_registry_is_still_a_valid_sentinel() -> anyhow::Result<()> {
    let conventions = MarkerConventions::default();
    let patcher = ClassFilePatcher::new(conventions.clone());
    let registry = ClassFileBuilder::class(&conventions.registry_class).build()?;

    let patched = registry_abstractions::InitializerPatcher::append_static_initializer(
        &patcher,
        &registry,
        &[RegistrationStatement::new("a.IBar", "a.FooFactory")],
    )?;

    let reparsed = ClassFile::parse(&patched)?;
    assert_eq!(reparsed.to_bytes(), patched);

    let descriptor = ClassFileIntrospector::new().introspect(&patched)?;
    assert_eq!(descriptor.qualified_name, conventions.registry_class);
    assert!(conventions.is_registry(&descriptor.qualified_name));

    let method = reparsed.method(CLINIT, "()V")?.expect("应当生成静态初始化块");
    assert_ne!(method.access_flags & classfile_tools::class_file::ACC_STATIC, 0);
    Ok(())
}

#[tokio::test]
async fn test_snapshot_carries_registrations_into_next_build() {
    let conventions = MarkerConventions::default();
    let temp = TempDir::new().unwrap();
    let registry = ClassFileBuilder::class(&conventions.registry_class)
        .build()
        .unwrap();

    let mut first = orchestrator(&conventions, temp.path());
    first.begin(true).await;
    first
        .process_units(&[
            added(
                "a.ISingle",
                ClassFileBuilder::interface("a.ISingle")
                    .annotate_visible(provider_marker(&conventions, "SINGLE"))
                    .build()
                    .unwrap(),
            ),
            added(
                "a.OnlyFactory",
                ClassFileBuilder::class("a.OnlyFactory")
                    .implements(&conventions.builder_interface)
                    .annotate(build_marker(&conventions, &["a.ISingle"]))
                    .build()
                    .unwrap(),
            ),
            added(&conventions.registry_class, registry.clone()),
        ])
        .unwrap();
    first.finish().await.unwrap();

    let text = tokio::fs::read_to_string(temp.path().join(CACHE_FILE_NAME))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"key": "a.ISingle", "isSingle": true, "values": ["a.OnlyFactory"]}
        ])
    );

    // 新进程：只有注册表单元且未变更
    let mut second = orchestrator(&conventions, temp.path());
    second.begin(true).await;
    let found = second
        .process_units(&[unchanged(&conventions.registry_class, registry)])
        .unwrap();
    assert!(found);
    assert!(second.model().get("a.ISingle").unwrap().single_policy);

    let patched = second.finish().await.unwrap().unwrap();
    assert_eq!(
        ClassFilePatcher::registrations(&patched.bytes).unwrap(),
        vec![RegistrationStatement::new("a.ISingle", "a.OnlyFactory")]
    );
}

#[tokio::test]
async fn test_config_file_drives_directory_transform() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let temp = TempDir::new().unwrap();
    let conventions = MarkerConventions::for_package("org.sample.services");

    let config_path = input.path().join("service-builder.toml");
    tokio::fs::write(
        &config_path,
        format!(
            r#"
temp_dir = "{}"
incremental = false

[conventions]
builder_annotation = "org.sample.services.Build"
builder_interface = "org.sample.services.ServiceBuilder"
provider_annotation = "org.sample.services.ServiceProvider"
registry_class = "org.sample.services.ServiceBuilderRegistry"
"#,
            temp.path().display().to_string().replace('\\', "/")
        ),
    )
    .await
    .unwrap();

    let classes = input.path().join("classes");
    for (name, bytes) in [
        (
            conventions.registry_class.clone(),
            ClassFileBuilder::class(&conventions.registry_class)
                .build()
                .unwrap(),
        ),
        (
            "org.sample.app.GreeterFactory".to_string(),
            ClassFileBuilder::class("org.sample.app.GreeterFactory")
                .implements(&conventions.builder_interface)
                .annotate(build_marker(&conventions, &["org.sample.app.Greeter"]))
                .build()
                .unwrap(),
        ),
    ] {
        let path = classes.join(unit_path(&name));
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, bytes).await.unwrap();
    }

    let config = TransformConfig::load(Some(&config_path)).unwrap();
    assert_eq!(config.conventions, conventions);
    assert!(!config.incremental);

    let mut transform = TransformBuilder::from_config(config).build().unwrap();
    let report = transform
        .transform(
            &DirectoryUnitSource::new(&classes),
            &mut DirectoryUnitSink::new(output.path()),
        )
        .await
        .unwrap();
    assert_eq!(report.statements, 1);

    let patched = tokio::fs::read(output.path().join(unit_path(&conventions.registry_class)))
        .await
        .unwrap();
    assert_eq!(
        ClassFilePatcher::registrations(&patched).unwrap(),
        vec![RegistrationStatement::new(
            "org.sample.app.Greeter",
            "org.sample.app.GreeterFactory"
        )]
    );

    let register_descriptor = ClassFilePatcher::new(conventions).register_descriptor();
    assert_eq!(
        register_descriptor,
        "(Ljava/lang/Class;Lorg/sample/services/ServiceBuilder;)V"
    );
    assert!(patched
        .windows(register_descriptor.len())
        .any(|window| window == register_descriptor.as_bytes()));
    assert!(temp.path().join(CACHE_FILE_NAME).exists());
}
