//! Fixture provisioning: the courses, modules and items the suites run against.
//!
//! Every create call is logged and its error propagated; the runner turns a
//! propagated error into a failed suite setup.

use anyhow::Context;
use futures_util::future::try_join_all;
use tracing::{error, info};

use crate::canvas::{
    CanvasClient, Course, DefaultView, Module, ModuleItem, NewCourse, NewModule, NewModuleItem,
};

/// Assignment linked from the first module.
pub const ASSIGNMENT_NAME: &str = "Test Assignment";
/// Title of the external-URL module item.
pub const EXTERNAL_ITEM_TITLE: &str = "Test module item";

/// Name and code of a throwaway course.
#[derive(Debug, Clone, Copy)]
pub struct CourseSpec {
    pub name: &'static str,
    pub code: &'static str,
}

pub const GENERAL_COURSE: CourseSpec = CourseSpec {
    name: "IGNORE: CPN TESTING",
    code: "ignore_cpn_testing",
};

pub const EMPTY_COURSE: CourseSpec = CourseSpec {
    name: "IGNORE: CPN EMPTY TESTING",
    code: "ignore_cpn_empty_testing",
};

/// Create a course whose home page is the modules list.
pub async fn create_course(
    canvas: &CanvasClient,
    account_id: &str,
    spec: CourseSpec,
) -> anyhow::Result<Course> {
    let new_course = NewCourse {
        name: spec.name.to_string(),
        course_code: spec.code.to_string(),
        default_view: DefaultView::Modules,
    };
    match canvas.create_course(account_id, &new_course).await {
        Ok(course) => {
            info!(course_id = course.id, name = %course.name, "course created");
            Ok(course)
        }
        Err(e) => {
            error!("error creating course: {e:#}");
            Err(e)
        }
    }
}

/// Create `count` modules concurrently, named `Module {i}` at position `i + 1`.
///
/// All must succeed. The result is ordered by position, not completion.
pub async fn create_modules(
    canvas: &CanvasClient,
    course_id: u64,
    count: usize,
) -> anyhow::Result<Vec<Module>> {
    let requests = (0..count).map(|i| async move {
        let new_module = NewModule {
            name: format!("Module {i}"),
            position: (i + 1) as u32,
        };
        match canvas.create_module(course_id, &new_module).await {
            Ok(module) => {
                info!(course_id, module_id = module.id, "created module {i}");
                Ok((i, module))
            }
            Err(e) => {
                error!(course_id, "error creating module {i}: {e:#}");
                Err(e.context(format!("creating module {i}")))
            }
        }
    });

    let mut created = try_join_all(requests).await?;
    created.sort_by_key(|(i, _)| *i);
    Ok(created.into_iter().map(|(_, m)| m).collect())
}

/// Put an assignment item and an external-URL item into `module_id`.
///
/// Returns them in that order.
pub async fn create_module_items(
    canvas: &CanvasClient,
    course_id: u64,
    module_id: u64,
    external_url: &str,
) -> anyhow::Result<Vec<ModuleItem>> {
    let assignment = canvas
        .create_assignment(course_id, ASSIGNMENT_NAME)
        .await
        .inspect_err(|e| error!(course_id, "error creating assignment item: {e:#}"))?;
    info!(course_id, assignment_id = assignment.id, "assignment item created");

    let assignment_item = canvas
        .create_module_item(
            course_id,
            module_id,
            &NewModuleItem::assignment(ASSIGNMENT_NAME, assignment.id),
        )
        .await
        .inspect_err(|e| error!(course_id, module_id, "error creating new assignment item: {e:#}"))?;
    info!(course_id, item_id = assignment_item.id, "created new assignment item");

    let url_item = canvas
        .create_module_item(
            course_id,
            module_id,
            &NewModuleItem::external_url(EXTERNAL_ITEM_TITLE, external_url),
        )
        .await
        .inspect_err(|e| error!(course_id, module_id, "error creating new url item: {e:#}"))?;
    info!(course_id, item_id = url_item.id, "created new url item");

    Ok(vec![assignment_item, url_item])
}

/// Delete a fixture course. Failures are logged and returned.
pub async fn teardown_course(canvas: &CanvasClient, course_id: u64) -> anyhow::Result<()> {
    canvas
        .delete_course(course_id)
        .await
        .inspect_err(|e| error!(course_id, "error deleting course: {e:#}"))
        .with_context(|| format!("deleting course {course_id}"))?;
    info!(course_id, "deleted course");
    Ok(())
}
