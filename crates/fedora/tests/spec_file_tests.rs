//! Spec file updates against a realistic package spec.

use chrono::NaiveDate;
use relbot_fedora::SpecUpdate;
use relbot_fedora::spec::spec_version;

const EXAMPLE_SPEC: &str = "\
%global pypi_name example

Name:           python-%{pypi_name}
Version:        0.0.1
Release:        1%{?dist}
Summary:        Example package

License:        MIT
URL:            https://github.com/user-cont/example
Source0:        %{pypi_name}-%{version}.tar.gz

%description
An example package.

%files
%license LICENSE

%changelog
* Fri Nov 30 2018 John Doe <jdoe@example.com> 0.0.1-1
- Initial package
";

fn update() -> SpecUpdate {
    SpecUpdate {
        version: "0.0.2".to_string(),
        author_name: "John Doe".to_string(),
        author_email: "jdoe@example.com".to_string(),
        changelog: Vec::new(),
        date: NaiveDate::from_ymd_opt(2018, 12, 24).unwrap(),
    }
}

#[test]
fn spec_file_is_rewritten_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.spec");
    std::fs::write(&path, EXAMPLE_SPEC).unwrap();

    update().update_file(&path).unwrap();

    let updated = std::fs::read_to_string(&path).unwrap();
    assert_eq!(spec_version(&updated), Some("0.0.2"));
    assert!(updated.contains("Source0:        %{pypi_name}-%{version}.tar.gz\n"));
    assert!(updated.contains(
        "%changelog\n* Mon Dec 24 2018 John Doe <jdoe@example.com> 0.0.2-1\n- 0.0.2 release\n\n* Fri Nov 30 2018"
    ));
}

#[test]
fn only_the_first_changelog_section_gets_the_entry() {
    let spec = format!("{EXAMPLE_SPEC}\n%changelog\n");
    let updated = update().apply(&spec);
    assert_eq!(updated.matches("0.0.2-1").count(), 1);
}

#[test]
fn updating_twice_keeps_one_version_line() {
    let once = update().apply(EXAMPLE_SPEC);
    let twice = update().apply(&once);
    assert_eq!(twice.matches("Version:").count(), 1);
    assert_eq!(twice.matches("Release:\t1%{?dist}").count(), 1);
}
